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

//! Per-stage analysis settings. Every record has defaults matching the values the
//! piano banks were tuned with, and is validated once by [super::ExtractionConfig::validate].

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Interpolation used when reading signals at fractional positions.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Straight line between neighbouring samples.
    Linear,
    /// Natural cubic spline through the surrounding samples.
    #[default]
    Cubic,
}

/// Windowed RMS envelope geometry.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// RMS window length in milliseconds.
    pub window_ms: f64,
    /// Distance between successive windows in milliseconds.
    pub hop_ms: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            window_ms: 50.0,
            hop_ms: 10.0,
        }
    }
}

impl EnvelopeConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.hop_ms <= 0.0 || self.window_ms <= self.hop_ms {
            return Err(ConfigError::Invalid(format!(
                "envelope window ({} ms) must be longer than a positive hop ({} ms)",
                self.window_ms, self.hop_ms
            )));
        }
        Ok(())
    }
}

/// How the end of each note's attack is located.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateDetectionStrategy {
    /// Close the gate when the dominant channel falls below an absolute level.
    ThresholdDb { threshold_db: f64 },
    /// Close the gate when the RMS falls below a fraction of the note's peak RMS.
    PeakPercentDecay { fraction: f64 },
    /// Close the gate at the knee of the note's decaying dB envelope.
    KneeCurve {
        /// Envelope hops skipped after the onset before searching.
        offset_hops: usize,
        /// Moving average length, in hops, applied before locating the knee.
        smoothing_hops: usize,
    },
}

impl Default for GateDetectionStrategy {
    fn default() -> Self {
        GateDetectionStrategy::ThresholdDb {
            threshold_db: -43.0,
        }
    }
}

/// Attack gate detection settings.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    pub strategy: GateDetectionStrategy,
    /// Shortest allowed attack in milliseconds. Shorter gates are extended forward.
    pub min_gate_ms: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            strategy: GateDetectionStrategy::default(),
            min_gate_ms: 1000.0,
        }
    }
}

impl GateConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.min_gate_ms < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_gate_ms must not be negative, found {}",
                self.min_gate_ms
            )));
        }
        if let GateDetectionStrategy::PeakPercentDecay { fraction } = self.strategy {
            if !(0.0..1.0).contains(&fraction) {
                return Err(ConfigError::Invalid(format!(
                    "peak decay fraction must be in [0, 1), found {}",
                    fraction
                )));
            }
        }
        Ok(())
    }
}

/// Selects which snippets feed the pitch estimator.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PitchTrackConfig {
    /// Notes quieter than this velocity are never used for pitch estimation.
    pub min_velocity: u8,
    /// First snippet index (inclusive) sampled for pitch.
    pub min_table_index: usize,
    /// Last snippet index (inclusive) sampled for pitch.
    pub max_table_index: usize,
}

impl Default for PitchTrackConfig {
    fn default() -> Self {
        Self {
            min_velocity: 50,
            min_table_index: 2,
            max_table_index: 4,
        }
    }
}

impl PitchTrackConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.min_table_index > self.max_table_index {
            return Err(ConfigError::Invalid(format!(
                "pitch track table window [{}, {}] is empty",
                self.min_table_index, self.max_table_index
            )));
        }
        Ok(())
    }
}

/// Cycle autocorrelation settings for the pitch estimator.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AutocorrelationConfig {
    /// Cycles compared on each side of the reference cycle.
    pub cycle_count: usize,
    /// Interpolator used to align shifted cycles.
    pub interp: Interpolation,
    /// Upsampling factor applied before correlating. 1 disables upsampling.
    pub upsample_factor: usize,
    /// Interpolator used to fill upsampled positions.
    pub upsample_interp: Interpolation,
}

impl Default for AutocorrelationConfig {
    fn default() -> Self {
        Self {
            cycle_count: 8,
            interp: Interpolation::Cubic,
            upsample_factor: 2,
            upsample_interp: Interpolation::Cubic,
        }
    }
}

impl AutocorrelationConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_count == 0 {
            return Err(ConfigError::Invalid(
                "autocorrelation cycle_count must be at least 1".to_string(),
            ));
        }
        if self.upsample_factor == 0 {
            return Err(ConfigError::Invalid(
                "upsample_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the loop-point table selection.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoopSearchConfig {
    /// Distance from the note end back to the fixed loop end, in milliseconds.
    pub end_offset_ms: f64,
    /// Approximate loop duration in milliseconds.
    pub loop_duration_ms: f64,
    /// Count of candidate loop starts evaluated.
    pub guess_count: usize,
}

impl Default for LoopSearchConfig {
    fn default() -> Self {
        Self {
            end_offset_ms: 100.0,
            loop_duration_ms: 100.0,
            guess_count: 40,
        }
    }
}

impl LoopSearchConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.guess_count == 0 || self.loop_duration_ms <= 0.0 || self.end_offset_ms < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "loop search needs guesses and a positive duration: {:?}",
                self
            )));
        }
        Ok(())
    }
}
