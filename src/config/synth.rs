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
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// The configuration for resynthesizing a bank.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SynthConfig {
    /// Length of each rendered note in seconds.
    pub note_duration_secs: f64,
    /// Silence between rendered notes in seconds.
    pub inter_note_secs: f64,
    /// Number of parallel workers. 0 renders every pitch in the calling thread.
    pub worker_count: usize,
    /// Fail the batch if no worker reports back within this many seconds.
    pub liveness_timeout_secs: Option<f64>,
    /// Only render these pitches when set.
    pub pitch_filter: Option<Vec<u8>>,
    /// Directory receiving `<ppp>_osc.wav` files.
    pub output_dir: PathBuf,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            note_duration_secs: 10.0,
            inter_note_secs: 1.0,
            worker_count: num_cpus::get(),
            liveness_timeout_secs: None,
            pitch_filter: None,
            output_dir: PathBuf::from("osc"),
        }
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.note_duration_secs <= 0.0 || self.inter_note_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "note duration must be positive and inter-note gap non-negative ({}s, {}s)",
                self.note_duration_secs, self.inter_note_secs
            )));
        }
        if matches!(self.liveness_timeout_secs, Some(secs) if secs <= 0.0) {
            return Err(ConfigError::Invalid(
                "liveness_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true if the given pitch should be rendered.
    pub fn includes(&self, midi_pitch: u8) -> bool {
        self.pitch_filter
            .as_ref()
            .map_or(true, |pitches| pitches.contains(&midi_pitch))
    }

    /// The liveness timeout as a duration.
    pub fn liveness_timeout(&self) -> Option<Duration> {
        self.liveness_timeout_secs.map(Duration::from_secs_f64)
    }
}
