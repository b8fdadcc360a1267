// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use tracing::{debug, warn};

use crate::audio::SampleBuffer;
use crate::bank::PitchRecord;
use crate::config::SynthConfig;
use crate::util::secs_to_samples;

use super::oscillator::synthesize;
use super::SynthError;

/// Renders every velocity of a pitch back to back, each note followed by the
/// configured gap of silence.
pub fn render_pitch(
    record: &PitchRecord,
    source: &SampleBuffer,
    config: &SynthConfig,
) -> Result<SampleBuffer, SynthError> {
    let sample_rate = source.sample_rate();
    if record.sample_rate != sample_rate {
        return Err(SynthError::SampleRate {
            expected: record.sample_rate,
            found: sample_rate,
        });
    }

    let note_len = secs_to_samples(config.note_duration_secs, sample_rate);
    let stride = note_len + secs_to_samples(config.inter_note_secs, sample_rate);
    let mut output = SampleBuffer::silent(
        source.channel_count(),
        record.velocities.len() * stride,
        sample_rate,
    );

    for (slot, velocity) in record.velocities.iter().enumerate() {
        if velocity.channels.len() != source.channel_count() {
            return Err(SynthError::ChannelCount {
                velocity: velocity.velocity,
                expected: source.channel_count(),
                found: velocity.channels.len(),
            });
        }

        for (channel, tables) in velocity.channels.iter().enumerate() {
            if tables.is_empty() {
                warn!(
                    midi_pitch = record.midi_pitch,
                    velocity = velocity.velocity,
                    channel,
                    "No wavetables, rendering silence"
                );
                continue;
            }
            let note = synthesize(
                source.channel(channel),
                velocity.attack_begin,
                tables,
                config.note_duration_secs,
                record.wavetable_interval_secs,
                sample_rate,
            )?;
            let begin = slot * stride;
            output.channel_mut(channel)[begin..begin + note.len()].copy_from_slice(&note);
        }
        debug!(
            midi_pitch = record.midi_pitch,
            velocity = velocity.velocity,
            "Rendered note"
        );
    }

    Ok(output)
}
