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
use std::path::Path;

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use tracing::debug;

pub mod analysis;
pub mod error;
pub mod extraction;
pub mod synth;

pub use analysis::{
    AutocorrelationConfig, EnvelopeConfig, GateConfig, GateDetectionStrategy, Interpolation,
    LoopSearchConfig, PitchTrackConfig,
};
pub use error::ConfigError;
pub use extraction::ExtractionConfig;
pub use synth::SynthConfig;

/// Prefix for environment variable overrides, e.g. `WTBANK_WORKER_COUNT=4`.
const ENV_PREFIX: &str = "WTBANK";

/// Loads a config record from a file, layering `WTBANK_` environment overrides on top.
/// Nested fields use a double underscore: `WTBANK_GATE__MIN_GATE_MS=500`.
fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    debug!(path = ?path, "Loading configuration");
    Ok(Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize()?)
}

/// Loads and validates an extraction configuration.
pub fn load_extraction_config(path: &Path) -> Result<ExtractionConfig, ConfigError> {
    let config: ExtractionConfig = load(path)?;
    config.validate()?;
    Ok(config)
}

/// Loads and validates a resynthesis configuration.
pub fn load_synth_config(path: &Path) -> Result<SynthConfig, ConfigError> {
    let config: SynthConfig = load(path)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use config::{Config, File, FileFormat};

    use super::*;

    fn from_yaml<T: DeserializeOwned>(yaml: &str) -> T {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_extraction_config_defaults() {
        let config: ExtractionConfig = from_yaml(
            r#"
            source_dir: /media/audio/wt6
            midi_pitches: [33, 60]
            worker_count: 0
        "#,
        );

        assert_eq!(PathBuf::from("/media/audio/wt6"), config.source_dir);
        assert_eq!(vec![33, 60], config.midi_pitches);
        assert_eq!(0, config.worker_count);
        assert_eq!("piano", config.instrument_name);
        assert_eq!(EnvelopeConfig::default(), config.envelope);
        assert_eq!(
            GateDetectionStrategy::ThresholdDb {
                threshold_db: -43.0
            },
            config.gate.strategy
        );
        assert_eq!(8, config.autocorrelation.cycle_count);
        assert_eq!(Interpolation::Cubic, config.autocorrelation.interp);
        assert!(config.loop_search.is_none());
        assert!((config.wavetable_interval_secs() - 2.0).abs() < 1e-12);
        config.validate().unwrap();
    }

    #[test]
    fn test_extraction_config_strategies() {
        let config: ExtractionConfig = from_yaml(
            r#"
            gate:
              min_gate_ms: 250
              strategy:
                kind: peak_percent_decay
                fraction: 0.1
            autocorrelation:
              interp: linear
              upsample_factor: 1
            loop_search:
              guess_count: 12
        "#,
        );
        assert_eq!(250.0, config.gate.min_gate_ms);
        assert_eq!(
            GateDetectionStrategy::PeakPercentDecay { fraction: 0.1 },
            config.gate.strategy
        );
        assert_eq!(Interpolation::Linear, config.autocorrelation.interp);
        assert_eq!(1, config.autocorrelation.upsample_factor);
        let loop_search = config.loop_search.as_ref().unwrap();
        assert_eq!(12, loop_search.guess_count);
        assert_eq!(100.0, loop_search.loop_duration_ms);

        let config: ExtractionConfig = from_yaml(
            r#"
            gate:
              strategy:
                kind: knee_curve
                offset_hops: 10
                smoothing_hops: 3
        "#,
        );
        assert_eq!(
            GateDetectionStrategy::KneeCurve {
                offset_hops: 10,
                smoothing_hops: 3
            },
            config.gate.strategy
        );
    }

    #[test]
    fn test_extraction_config_validation() {
        let mut config = ExtractionConfig::default();
        config.validate().unwrap();

        config.envelope.hop_ms = 60.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ExtractionConfig {
            storage_downsample_factor: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.storage_downsample_factor = 4;
        config.pitch_track.min_table_index = 5;
        assert!(config.validate().is_err());

        let config = ExtractionConfig {
            gate: GateConfig {
                strategy: GateDetectionStrategy::PeakPercentDecay { fraction: 1.5 },
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_synth_config() {
        let config: SynthConfig = from_yaml(
            r#"
            note_duration_secs: 4
            pitch_filter: [27]
            output_dir: /tmp/osc
        "#,
        );
        assert_eq!(4.0, config.note_duration_secs);
        assert_eq!(1.0, config.inter_note_secs);
        assert!(config.includes(27));
        assert!(!config.includes(28));
        config.validate().unwrap();

        let config = SynthConfig {
            note_duration_secs: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(SynthConfig::default().includes(60));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.yaml");
        std::fs::write(
            &path,
            "instrument_name: ivory\nmidi_pitches: [60]\nmin_table_db: -70\n",
        )
        .unwrap();

        let config = load_extraction_config(&path).unwrap();
        assert_eq!("ivory", config.instrument_name);
        assert_eq!(-70.0, config.min_table_db);

        assert!(matches!(
            load_extraction_config(&dir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
    }
}
