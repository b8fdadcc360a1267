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

//! Wavetable extraction for one MIDI pitch.
//!
//! Each note's sustain is walked from the end of its attack gate at a fixed pitch
//! tracking interval. Every step snaps forward to an upward zero crossing and takes a
//! two period snippet there. A decimated subset of the snippets is stored as
//! wavetables, and a window of snippets on the dominant channel feeds the pitch
//! estimator.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::analysis::{
    estimate_frequency, find_loop_points, find_zero_crossing, AnalysisError, CandidateGrid,
    Direction, Gate, PitchStatistics,
};
use crate::audio::SampleBuffer;
use crate::config::{ExtractionConfig, LoopSearchConfig};
use crate::markers::Marker;
use crate::util::{amplitude_to_db, midi_pitch_to_hz, ms_to_samples, rms, secs_to_samples};

use super::model::{LoopSegment, PitchRecord, VelocityRecord, WavetableDescriptor};

/// Typed error for a failed pitch extraction. The pitch is always reported.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("pitch {midi_pitch}: {markers} markers but {gates} gates")]
    GateCount {
        midi_pitch: u8,
        markers: usize,
        gates: usize,
    },

    #[error("pitch {midi_pitch}: note {note} label {label:?} is not a MIDI velocity")]
    VelocityLabel {
        midi_pitch: u8,
        note: usize,
        label: String,
    },

    #[error("pitch {midi_pitch}: no snippet qualified for pitch estimation")]
    NoPitchEstimates { midi_pitch: u8 },

    #[error("pitch {midi_pitch}: {source}")]
    Analysis {
        midi_pitch: u8,
        source: AnalysisError,
    },
}

/// Per-pitch constants shared by every note.
struct PitchContext<'a> {
    midi_pitch: u8,
    config: &'a ExtractionConfig,
    grid: CandidateGrid,
    interval: usize,
    table_len: usize,
    dominant_channel: usize,
}

/// Extracts the wavetables of every note of one pitch.
///
/// `gates` must hold one gate per marker. The returned record has empty source
/// paths; see [PitchRecord::with_sources].
pub fn extract_bank(
    buffer: &SampleBuffer,
    markers: &[Marker],
    gates: &[Gate],
    midi_pitch: u8,
    dominant_channel: usize,
    config: &ExtractionConfig,
) -> Result<PitchRecord, ExtractError> {
    if markers.len() != gates.len() {
        return Err(ExtractError::GateCount {
            midi_pitch,
            markers: markers.len(),
            gates: gates.len(),
        });
    }

    let sample_rate = buffer.sample_rate();
    let cycle_len = sample_rate as f64 / midi_pitch_to_hz(midi_pitch as i32);
    let context = PitchContext {
        midi_pitch,
        config,
        grid: CandidateGrid::for_midi_pitch(midi_pitch),
        interval: secs_to_samples(config.pitch_track_interval_secs, sample_rate).max(1),
        table_len: (2.0 * cycle_len).floor() as usize,
        dominant_channel,
    };

    let mut estimates = Vec::new();
    let mut velocities = Vec::with_capacity(markers.len());
    for (note, (marker, gate)) in markers.iter().zip(gates).enumerate() {
        let velocity =
            marker
                .label
                .trim()
                .parse::<u8>()
                .map_err(|_| ExtractError::VelocityLabel {
                    midi_pitch,
                    note,
                    label: marker.label.clone(),
                })?;
        velocities.push(extract_note(
            &context,
            buffer,
            marker,
            gate,
            velocity,
            &mut estimates,
        )?);
    }

    let statistics = PitchStatistics::summarize(&estimates, &context.grid)
        .ok_or(ExtractError::NoPitchEstimates { midi_pitch })?;
    for table in velocities
        .iter_mut()
        .flat_map(|v| v.channels.iter_mut())
        .flat_map(|c| c.iter_mut())
    {
        table.estimated_hz = statistics.mean_hz;
    }

    info!(
        midi_pitch,
        estimated_hz = statistics.mean_hz,
        error_cents = statistics.error_cents,
        std_cents = statistics.std_cents,
        estimates = estimates.len(),
        "Extracted pitch"
    );

    Ok(PitchRecord {
        midi_pitch,
        sample_rate,
        estimated_hz_mean: statistics.mean_hz,
        estimated_hz_error_cents: statistics.error_cents,
        estimated_hz_std_cents: statistics.std_cents,
        wavetable_interval_secs: config.wavetable_interval_secs(),
        dominant_channel,
        source_audio: PathBuf::new(),
        source_markers: PathBuf::new(),
        velocities,
    })
}

impl PitchRecord {
    /// Records the files the pitch was extracted from.
    pub fn with_sources(mut self, audio: PathBuf, markers: PathBuf) -> Self {
        self.source_audio = audio;
        self.source_markers = markers;
        self
    }
}

fn extract_note(
    context: &PitchContext,
    buffer: &SampleBuffer,
    marker: &Marker,
    gate: &Gate,
    velocity: u8,
    estimates: &mut Vec<f64>,
) -> Result<VelocityRecord, ExtractError> {
    let midi_pitch = context.midi_pitch;
    let config = context.config;
    let sample_rate = buffer.sample_rate();
    let note_end = marker.end_sample(sample_rate).min(buffer.frame_count());

    let estimate_pitch = velocity >= config.pitch_track.min_velocity;
    let mut channels = Vec::with_capacity(buffer.channel_count());

    for channel in 0..buffer.channel_count() {
        let samples = buffer.channel(channel);
        let mut tables: Vec<WavetableDescriptor> = Vec::new();

        for step in 0.. {
            let position = gate.end + step * context.interval;
            let Some(begin) = find_zero_crossing(samples, position, Direction::Forward) else {
                break;
            };
            let end = begin + context.table_len;
            if end > note_end {
                break;
            }

            if channel == context.dominant_channel
                && estimate_pitch
                && (config.pitch_track.min_table_index..=config.pitch_track.max_table_index)
                    .contains(&step)
            {
                match estimate_frequency(
                    samples,
                    begin,
                    context.grid.hz(),
                    sample_rate,
                    &config.autocorrelation,
                ) {
                    Ok(estimate) => estimates.push(estimate.hz),
                    Err(e @ AnalysisError::AnchorOutOfRange { .. }) => {
                        warn!(midi_pitch, velocity, channel, step, err = %e, "Skipping pitch estimate");
                    }
                    Err(source) => return Err(ExtractError::Analysis { midi_pitch, source }),
                }
            }

            if step % config.storage_downsample_factor != 0 {
                continue;
            }
            let level = rms(&samples[begin..end]);
            let keep = amplitude_to_db(level) > config.min_table_db || tables.len() < 2;
            let ascending = tables.last().map_or(true, |t| begin > t.begin);
            if !ascending {
                debug!(
                    midi_pitch,
                    velocity,
                    channel,
                    step,
                    begin,
                    "Snippet snapped onto the previous table, skipping"
                );
            } else if keep {
                tables.push(WavetableDescriptor {
                    begin,
                    end,
                    rms: level,
                    estimated_hz: 0.0,
                });
            }
        }

        if tables.is_empty() {
            warn!(
                midi_pitch,
                velocity, channel, "Note sustain too short for a single wavetable"
            );
        }
        debug!(midi_pitch, velocity, channel, tables = tables.len(), "Extracted note");
        channels.push(tables);
    }

    let loops = match &config.loop_search {
        Some(search) => find_note_loops(buffer, marker, midi_pitch, search)?,
        None => Vec::new(),
    };

    Ok(VelocityRecord {
        velocity,
        attack_begin: gate.begin,
        attack_end: gate.end,
        channels,
        loops,
    })
}

/// Runs the loop-point search over the tail of a note on every channel.
///
/// The search covers `loop_duration_ms` ending `end_offset_ms` before the note end.
/// Channels without a usable loop are skipped with a warning.
pub fn find_note_loops(
    buffer: &SampleBuffer,
    marker: &Marker,
    midi_pitch: u8,
    search: &LoopSearchConfig,
) -> Result<Vec<LoopSegment>, ExtractError> {
    let sample_rate = buffer.sample_rate();
    let cycle_len = sample_rate as f64 / midi_pitch_to_hz(midi_pitch as i32);
    let note_end = marker.end_sample(sample_rate);
    let search_end = note_end.checked_sub(ms_to_samples(search.end_offset_ms, sample_rate));
    let search_begin = search_end
        .and_then(|e| e.checked_sub(ms_to_samples(search.loop_duration_ms, sample_rate)));
    let (Some(search_begin), Some(search_end)) = (search_begin, search_end) else {
        warn!(midi_pitch, note = %marker.label, "Note too short for a loop search");
        return Ok(Vec::new());
    };
    let match_window = (cycle_len / 3.0) as usize;

    let mut loops = Vec::with_capacity(buffer.channel_count());
    for channel in 0..buffer.channel_count() {
        match find_loop_points(
            buffer.channel(channel),
            search_begin,
            search_end,
            cycle_len,
            match_window,
            search.guess_count,
        ) {
            Ok(points) => loops.push(LoopSegment {
                channel,
                begin: points.begin,
                end: points.end,
                cost: points.cost,
            }),
            Err(e @ AnalysisError::NoLoopCandidate { .. }) => {
                warn!(midi_pitch, note = %marker.label, channel, err = %e, "No loop found");
            }
            Err(source) => return Err(ExtractError::Analysis { midi_pitch, source }),
        }
    }
    Ok(loops)
}
