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

use super::analysis::{
    AutocorrelationConfig, EnvelopeConfig, GateConfig, LoopSearchConfig, PitchTrackConfig,
};
use super::error::ConfigError;

/// Lowest key on an 88 key piano.
const DEFAULT_LOWEST_PITCH: u8 = 21;
/// Highest key on an 88 key piano.
const DEFAULT_HIGHEST_PITCH: u8 = 108;

/// The configuration for a bank extraction run. A copy of this record is stored
/// in the resulting bank.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Name of the sampled instrument.
    pub instrument_name: String,
    /// Directory holding `wav/<ppp>_samples.wav` and `<ppp>_marker.txt` per pitch.
    pub source_dir: PathBuf,
    /// MIDI pitches to extract.
    pub midi_pitches: Vec<u8>,
    /// Where the bank is written.
    pub output_path: PathBuf,
    /// Number of parallel workers. 0 runs every pitch in the calling thread.
    pub worker_count: usize,
    /// Fail the batch if no worker reports back within this many seconds.
    pub liveness_timeout_secs: Option<f64>,
    pub envelope: EnvelopeConfig,
    pub gate: GateConfig,
    /// Interval between successive snippets, in seconds.
    pub pitch_track_interval_secs: f64,
    /// Only every n-th snippet is stored as a wavetable.
    pub storage_downsample_factor: usize,
    /// Stored wavetables must be louder than this level, in dB.
    pub min_table_db: f64,
    pub pitch_track: PitchTrackConfig,
    pub autocorrelation: AutocorrelationConfig,
    /// Enables the loop-point table selection alongside the tracked tables.
    pub loop_search: Option<LoopSearchConfig>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            instrument_name: "piano".to_string(),
            source_dir: PathBuf::from("."),
            midi_pitches: (DEFAULT_LOWEST_PITCH..=DEFAULT_HIGHEST_PITCH).collect(),
            output_path: PathBuf::from("bank.json"),
            worker_count: num_cpus::get(),
            liveness_timeout_secs: None,
            envelope: EnvelopeConfig::default(),
            gate: GateConfig::default(),
            pitch_track_interval_secs: 0.25,
            storage_downsample_factor: 8,
            min_table_db: -80.0,
            pitch_track: PitchTrackConfig::default(),
            autocorrelation: AutocorrelationConfig::default(),
            loop_search: None,
        }
    }
}

impl ExtractionConfig {
    /// Checks every field once so the analysis stages can trust their inputs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.envelope.validate()?;
        self.gate.validate()?;
        self.pitch_track.validate()?;
        self.autocorrelation.validate()?;
        if let Some(loop_search) = &self.loop_search {
            loop_search.validate()?;
        }
        if self.pitch_track_interval_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "pitch_track_interval_secs must be positive, found {}",
                self.pitch_track_interval_secs
            )));
        }
        if self.storage_downsample_factor == 0 {
            return Err(ConfigError::Invalid(
                "storage_downsample_factor must be at least 1".to_string(),
            ));
        }
        if self.midi_pitches.iter().any(|&p| p > 127) {
            return Err(ConfigError::Invalid(format!(
                "MIDI pitches must be in 0..=127: {:?}",
                self.midi_pitches
            )));
        }
        if matches!(self.liveness_timeout_secs, Some(secs) if secs <= 0.0) {
            return Err(ConfigError::Invalid(
                "liveness_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Time between stored wavetables, in seconds.
    pub fn wavetable_interval_secs(&self) -> f64 {
        self.pitch_track_interval_secs * self.storage_downsample_factor as f64
    }

    /// The liveness timeout as a duration.
    pub fn liveness_timeout(&self) -> Option<Duration> {
        self.liveness_timeout_secs.map(Duration::from_secs_f64)
    }
}
