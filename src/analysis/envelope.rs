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

//! Windowed RMS envelopes.
//!
//! Envelope index `i` corresponds to raw sample index `i * hop`: the first window's
//! value is repeated `window / hop - 1` times so the two index spaces line up.

use crate::audio::SampleBuffer;
use crate::config::EnvelopeConfig;
use crate::util::{amplitude_to_db, ms_to_samples, rms};

use super::AnalysisError;

/// Units of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeScale {
    /// Linear RMS amplitude.
    Linear,
    /// RMS in dB, silence floored at [crate::util::SILENCE_DB].
    Decibels,
}

/// Window and hop lengths in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeGeometry {
    window: usize,
    hop: usize,
}

impl EnvelopeGeometry {
    /// Creates a geometry from sample counts. The window must be a multiple of, and
    /// longer than, the hop.
    pub fn new(window: usize, hop: usize) -> Result<Self, AnalysisError> {
        if hop == 0 || window <= hop || window % hop != 0 {
            return Err(AnalysisError::InvalidEnvelope { window, hop });
        }
        Ok(Self { window, hop })
    }

    /// Converts a millisecond configuration to sample counts at the given rate.
    pub fn from_config(config: &EnvelopeConfig, sample_rate: u32) -> Result<Self, AnalysisError> {
        Self::new(
            ms_to_samples(config.window_ms, sample_rate),
            ms_to_samples(config.hop_ms, sample_rate),
        )
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn hop(&self) -> usize {
        self.hop
    }
}

/// Computes the RMS envelope of one channel.
pub fn rms_envelope(
    samples: &[f64],
    geometry: EnvelopeGeometry,
    scale: EnvelopeScale,
) -> Result<Vec<f64>, AnalysisError> {
    if samples.len() < geometry.window {
        return Err(AnalysisError::BufferTooShort {
            frames: samples.len(),
            window: geometry.window,
        });
    }

    let window_count = (samples.len() - geometry.window) / geometry.hop + 1;
    let lead = geometry.window / geometry.hop - 1;
    let mut envelope = Vec::with_capacity(lead + window_count);

    for w in 0..window_count {
        let begin = w * geometry.hop;
        let value = rms(&samples[begin..begin + geometry.window]);
        let value = match scale {
            EnvelopeScale::Linear => value,
            EnvelopeScale::Decibels => amplitude_to_db(value),
        };
        if w == 0 {
            envelope.extend(std::iter::repeat(value).take(lead));
        }
        envelope.push(value);
    }

    Ok(envelope)
}

/// Computes the envelope of every channel of a buffer.
pub fn channel_envelopes(
    buffer: &SampleBuffer,
    geometry: EnvelopeGeometry,
    scale: EnvelopeScale,
) -> Result<Vec<Vec<f64>>, AnalysisError> {
    buffer
        .channels()
        .iter()
        .map(|channel| rms_envelope(channel, geometry, scale))
        .collect()
}

/// Mean of each channel's envelope.
pub fn channel_means(envelopes: &[Vec<f64>]) -> Vec<f64> {
    envelopes
        .iter()
        .map(|e| {
            if e.is_empty() {
                0.0
            } else {
                e.iter().sum::<f64>() / e.len() as f64
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::SILENCE_DB;

    #[test]
    fn test_geometry_validation() {
        assert!(EnvelopeGeometry::new(2400, 480).is_ok());
        assert!(EnvelopeGeometry::new(480, 480).is_err());
        assert!(EnvelopeGeometry::new(1000, 480).is_err());
        assert!(EnvelopeGeometry::new(1000, 0).is_err());

        let geometry =
            EnvelopeGeometry::from_config(&EnvelopeConfig::default(), 48000).unwrap();
        assert_eq!(2400, geometry.window());
        assert_eq!(480, geometry.hop());
    }

    #[test]
    fn test_envelope_alignment() {
        let geometry = EnvelopeGeometry::new(4, 2).unwrap();
        // Silence, then a unit square wave from sample 8 on.
        let mut samples = vec![0.0; 8];
        samples.extend([1.0, -1.0].iter().cycle().take(8));

        let envelope = rms_envelope(&samples, geometry, EnvelopeScale::Linear).unwrap();

        // 7 full windows plus one repeated leading value.
        assert_eq!(8, envelope.len());
        assert_eq!(envelope[0], envelope[1]);
        assert_eq!(0.0, envelope[0]);
        // Window [6, 10) is half silent.
        assert!((envelope[4] - 0.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(1.0, envelope[7]);
    }

    #[test]
    fn test_envelope_db_floor() {
        let geometry = EnvelopeGeometry::new(4, 2).unwrap();
        let envelope = rms_envelope(&[0.0; 16], geometry, EnvelopeScale::Decibels).unwrap();
        assert!(envelope.iter().all(|&v| v == SILENCE_DB));

        let envelope = rms_envelope(&[0.1; 16], geometry, EnvelopeScale::Decibels).unwrap();
        assert!(envelope.iter().all(|&v| (v + 20.0).abs() < 1e-9));
    }

    #[test]
    fn test_envelope_too_short() {
        let geometry = EnvelopeGeometry::new(4, 2).unwrap();
        assert!(matches!(
            rms_envelope(&[0.0; 3], geometry, EnvelopeScale::Linear),
            Err(AnalysisError::BufferTooShort { frames: 3, window: 4 })
        ));
    }

    #[test]
    fn test_channel_means() {
        assert_eq!(vec![2.0, 0.0], channel_means(&[vec![1.0, 3.0], vec![]]));
    }
}
