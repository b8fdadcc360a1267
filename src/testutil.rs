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

//! Signal generators and fixture writers shared by the tests.

use std::error::Error;
use std::f64::consts::PI;
use std::fs::{self, File};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::SampleBuffer;
use crate::markers::{write_markers, Marker};
use crate::util::{marker_path, samples_path};

/// A sine tone shaped by `envelope(i)`. The phase is shifted half a sample so that
/// no sample lands exactly on zero.
pub fn tone(hz: f64, sample_rate: u32, frames: usize, envelope: impl Fn(usize) -> f64) -> Vec<f64> {
    (0..frames)
        .map(|i| envelope(i) * (2.0 * PI * hz * (i as f64 + 0.5) / sample_rate as f64).sin())
        .collect()
}

/// A recorded note for [note_recording].
pub struct TestNote {
    pub onset_secs: f64,
    pub amplitude: f64,
}

/// Builds a two channel recording of `hz` tones: each note fades in linearly over
/// `fade_secs`, holds for `hold_secs`, then stops. The second channel carries the
/// same signal at half amplitude.
pub fn note_recording(
    hz: f64,
    sample_rate: u32,
    duration_secs: f64,
    fade_secs: f64,
    hold_secs: f64,
    notes: &[TestNote],
) -> SampleBuffer {
    let frames = (duration_secs * sample_rate as f64) as usize;
    let rate = sample_rate as f64;
    let left = tone(hz, sample_rate, frames, |i| {
        let t = i as f64 / rate;
        notes
            .iter()
            .map(|note| {
                let local = t - note.onset_secs;
                if local < 0.0 || local >= fade_secs + hold_secs {
                    0.0
                } else if local < fade_secs {
                    note.amplitude * local / fade_secs
                } else {
                    note.amplitude
                }
            })
            .sum()
    });
    let right = left.iter().map(|s| s * 0.5).collect();

    SampleBuffer::new(vec![left, right], sample_rate).unwrap()
}

/// Builds a two channel recording of struck `hz` tones: each note plays at full
/// amplitude for `attack_secs`, then drops to `sustain_ratio` of it and decays
/// exponentially with time constant `decay_secs` until `note_secs` after the onset.
/// The second channel carries the same signal at half amplitude.
#[allow(clippy::too_many_arguments)]
pub fn struck_recording(
    hz: f64,
    sample_rate: u32,
    duration_secs: f64,
    attack_secs: f64,
    sustain_ratio: f64,
    decay_secs: f64,
    note_secs: f64,
    notes: &[TestNote],
) -> SampleBuffer {
    let frames = (duration_secs * sample_rate as f64) as usize;
    let rate = sample_rate as f64;
    let left = tone(hz, sample_rate, frames, |i| {
        let t = i as f64 / rate;
        notes
            .iter()
            .map(|note| {
                let local = t - note.onset_secs;
                if local < 0.0 || local >= note_secs {
                    0.0
                } else if local < attack_secs {
                    note.amplitude
                } else {
                    note.amplitude * sustain_ratio * (-(local - attack_secs) / decay_secs).exp()
                }
            })
            .sum()
    });
    let right = left.iter().map(|s| s * 0.5).collect();

    SampleBuffer::new(vec![left, right], sample_rate).unwrap()
}

/// Writes interleaved integer samples with the given bit depth.
pub fn write_wav<S: hound::Sample + Copy>(
    path: &Path,
    channels: &[Vec<S>],
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<(), Box<dyn Error>> {
    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels: channels.len() as u16,
            sample_rate,
            bits_per_sample,
            sample_format: SampleFormat::Int,
        },
    )?;
    let frames = channels.first().map_or(0, Vec::len);
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Lays out a pitch's recording and markers the way a source directory holds them.
pub fn write_source_files(
    source_dir: &Path,
    midi_pitch: u8,
    buffer: &SampleBuffer,
    markers: &[Marker],
) -> Result<(), Box<dyn Error>> {
    let wav = samples_path(source_dir, midi_pitch);
    if let Some(parent) = wav.parent() {
        fs::create_dir_all(parent)?;
    }
    crate::audio::write_samples(&wav, buffer)?;
    write_markers(marker_path(source_dir, midi_pitch), markers)?;
    Ok(())
}

/// Markers for three notes three seconds apart.
pub fn three_note_markers(velocities: [u8; 3]) -> Vec<Marker> {
    velocities
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let onset = 3.0 * i as f64;
            Marker::new(onset, onset + 2.05, v.to_string())
        })
        .collect()
}
