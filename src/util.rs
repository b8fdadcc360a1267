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

use std::path::{Path, PathBuf};

/// The level reported for a window of digital silence.
pub const SILENCE_DB: f64 = -100.0;

/// Converts a MIDI pitch to its nominal fundamental in Hz (A4 = MIDI 69 = 440 Hz).
pub fn midi_pitch_to_hz(midi_pitch: i32) -> f64 {
    13.75 * 2f64.powf(-9.0 / 12.0) * 2f64.powf(midi_pitch as f64 / 12.0)
}

/// Converts a linear amplitude to decibels, flooring silence at [SILENCE_DB].
pub fn amplitude_to_db(amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        SILENCE_DB
    } else {
        20.0 * amplitude.log10()
    }
}

/// Root-mean-square of a slice. Empty slices are silent.
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|x| x * x).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

/// Converts a duration in milliseconds to a whole number of samples.
pub fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    (ms * sample_rate as f64 / 1000.0).round().max(0.0) as usize
}

/// Converts a duration in seconds to a whole number of samples.
pub fn secs_to_samples(secs: f64, sample_rate: u32) -> usize {
    (secs * sample_rate as f64).round().max(0.0) as usize
}

/// Extracts a displayable file name from a path, returning a fallback if the name is unreadable.
pub fn filename_display(path: &Path) -> &str {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Path of the recorded samples for a pitch inside a source directory.
pub fn samples_path(source_dir: &Path, midi_pitch: u8) -> PathBuf {
    source_dir
        .join("wav")
        .join(format!("{:03}_samples.wav", midi_pitch))
}

/// Path of the note marker file for a pitch inside a source directory.
pub fn marker_path(source_dir: &Path, midi_pitch: u8) -> PathBuf {
    source_dir.join(format!("{:03}_marker.txt", midi_pitch))
}

/// Path of the resynthesized audio for a pitch inside an output directory.
pub fn oscillator_path(out_dir: &Path, midi_pitch: u8) -> PathBuf {
    out_dir.join(format!("{:03}_osc.wav", midi_pitch))
}

/// Path of the exported gate markers for a pitch inside an output directory.
pub fn gates_path(out_dir: &Path, midi_pitch: u8) -> PathBuf {
    out_dir.join(format!("{:03}_gates.txt", midi_pitch))
}

/// Path of the gated audio for a pitch inside an output directory.
pub fn gated_audio_path(out_dir: &Path, midi_pitch: u8) -> PathBuf {
    out_dir.join(format!("{:03}_gated.wav", midi_pitch))
}

/// Path of the loop markers for a pitch inside an output directory.
pub fn loops_path(out_dir: &Path, midi_pitch: u8) -> PathBuf {
    out_dir.join(format!("{:03}_loops.txt", midi_pitch))
}
