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

//! Cycle autocorrelation pitch estimation.
//!
//! Candidates are tested by comparing the cycle starting at an anchor against the
//! cycles before and after it, each read at the candidate's fractional period. The
//! candidate whose implied period lines the cycles up best wins.

use serde::{Deserialize, Serialize};

use crate::config::{AutocorrelationConfig, Interpolation};
use crate::util::midi_pitch_to_hz;

use super::interp::{upsample, Reader};
use super::AnalysisError;

/// Candidates per semitone (1 cent resolution).
const CENTS_PER_SEMITONE: usize = 100;

/// Candidate frequencies spanning one semitone below to just under one semitone
/// above a MIDI pitch, in 1 cent steps. Index [CandidateGrid::CENTER] is the
/// nominal pitch.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGrid {
    hz: Vec<f64>,
    lower_step: f64,
    upper_step: f64,
}

impl CandidateGrid {
    /// Index of the nominal frequency.
    pub const CENTER: usize = CENTS_PER_SEMITONE;

    pub fn for_midi_pitch(midi_pitch: u8) -> Self {
        let pitch = midi_pitch as i32;
        let hz_min = midi_pitch_to_hz(pitch - 1);
        let hz_center = midi_pitch_to_hz(pitch);
        let hz_max = midi_pitch_to_hz(pitch + 1);
        let lower_step = (hz_center - hz_min) / CENTS_PER_SEMITONE as f64;
        let upper_step = (hz_max - hz_center) / CENTS_PER_SEMITONE as f64;

        let below = (0..CENTS_PER_SEMITONE).map(|i| hz_min + i as f64 * lower_step);
        let above = (0..CENTS_PER_SEMITONE).map(|i| hz_center + i as f64 * upper_step);

        Self {
            hz: below.chain(above).collect(),
            lower_step,
            upper_step,
        }
    }

    pub fn hz(&self) -> &[f64] {
        &self.hz
    }

    /// Width in Hz of one cent below the nominal pitch.
    pub fn lower_step(&self) -> f64 {
        self.lower_step
    }

    /// Width in Hz of one cent above the nominal pitch.
    pub fn upper_step(&self) -> f64 {
        self.upper_step
    }

    /// Index of the candidate closest to `hz`.
    pub fn nearest_index(&self, hz: f64) -> usize {
        self.hz
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (i, &c)| {
                let distance = (c - hz).abs();
                if distance < best.1 {
                    (i, distance)
                } else {
                    best
                }
            })
            .0
    }
}

/// The winning candidate at one anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    pub hz: f64,
    /// Mean squared cycle difference per compared cycle.
    pub cost: f64,
    pub candidate_index: usize,
}

/// Aggregate of the estimates collected for one pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchStatistics {
    pub mean_hz: f64,
    /// Signed offset, in cents, of the candidate nearest the mean from the nominal pitch.
    pub error_cents: f64,
    /// Population standard deviation of the estimates scaled to cents.
    pub std_cents: f64,
}

impl PitchStatistics {
    /// Summarizes estimated frequencies against a grid. Returns `None` for no estimates.
    pub fn summarize(estimates: &[f64], grid: &CandidateGrid) -> Option<Self> {
        if estimates.is_empty() {
            return None;
        }
        let n = estimates.len() as f64;
        let mean_hz = estimates.iter().sum::<f64>() / n;
        let variance = estimates.iter().map(|e| (e - mean_hz).powi(2)).sum::<f64>() / n;

        let index = grid.nearest_index(mean_hz);
        let step = if index < CandidateGrid::CENTER {
            grid.lower_step()
        } else {
            grid.upper_step()
        };

        Some(Self {
            mean_hz,
            error_cents: index as f64 - CandidateGrid::CENTER as f64,
            std_cents: variance.sqrt() / step,
        })
    }
}

/// The slice of signal the candidates are tested against, possibly upsampled.
struct Neighborhood {
    samples: Vec<f64>,
    anchor: usize,
    sample_rate: f64,
}

/// Cuts out enough signal around `anchor` to test the slowest candidate over
/// `cycle_count` cycles on each side, upsampling it if configured.
fn neighborhood(
    channel: &[f64],
    anchor: usize,
    slowest_hz: f64,
    sample_rate: u32,
    config: &AutocorrelationConfig,
) -> Result<Neighborhood, AnalysisError> {
    let max_cycle = sample_rate as f64 / slowest_hz;
    let pad = match config.upsample_interp {
        Interpolation::Cubic => 2,
        Interpolation::Linear => 1,
    };
    let cycles = config.cycle_count as f64;
    let first = anchor as i64 - (max_cycle * cycles).ceil() as i64 - pad;
    let last = anchor as i64 + (max_cycle * (cycles + 1.0)).ceil() as i64 + pad;

    if first < 0 || last > channel.len() as i64 {
        return Err(AnalysisError::AnchorOutOfRange {
            anchor,
            first,
            last,
            len: channel.len(),
        });
    }
    let (first, last) = (first as usize, last as usize);
    let factor = config.upsample_factor.max(1);

    Ok(Neighborhood {
        samples: upsample(&channel[first..last], factor, config.upsample_interp),
        anchor: (anchor - first) * factor,
        sample_rate: sample_rate as f64 * factor as f64,
    })
}

/// Mean squared difference between the reference cycle at the anchor and the
/// cycles `1..=cycle_count` periods before and after it.
fn autocorrelation_cost(
    reader: &Reader,
    reference: &[f64],
    anchor: usize,
    cycle_len: f64,
    cycle_count: usize,
) -> f64 {
    let whole = (cycle_len.floor() as usize).min(reference.len());

    let mut total = 0.0;
    for k in 1..=cycle_count as i64 {
        for offset in [k, -k] {
            let begin = anchor as f64 + offset as f64 * cycle_len;
            total += reference[..whole]
                .iter()
                .enumerate()
                .map(|(j, r)| (reader.at(begin + j as f64) - r).powi(2))
                .sum::<f64>();
        }
    }

    total / (2 * cycle_count) as f64
}

/// Picks the candidate frequency whose period best matches the cycles around `anchor`.
pub fn estimate_frequency(
    channel: &[f64],
    anchor: usize,
    candidates: &[f64],
    sample_rate: u32,
    config: &AutocorrelationConfig,
) -> Result<PitchEstimate, AnalysisError> {
    let slowest = candidates
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if slowest <= 0.0 || !slowest.is_finite() {
        return Err(AnalysisError::NoCandidates);
    }

    let region = neighborhood(channel, anchor, slowest, sample_rate, config)?;
    let reader = Reader::new(&region.samples, config.interp);
    let longest = (region.sample_rate / slowest).floor() as usize;
    let reference_end = (region.anchor + longest).min(region.samples.len());
    let reference = &region.samples[region.anchor..reference_end];

    candidates
        .iter()
        .enumerate()
        .map(|(candidate_index, &hz)| PitchEstimate {
            hz,
            cost: autocorrelation_cost(
                &reader,
                reference,
                region.anchor,
                region.sample_rate / hz,
                config.cycle_count,
            ),
            candidate_index,
        })
        .fold(None, |best: Option<PitchEstimate>, e| match best {
            Some(b) if b.cost <= e.cost => Some(b),
            _ => Some(e),
        })
        .ok_or(AnalysisError::NoCandidates)
}

#[cfg(test)]
mod test {
    use std::f64::consts::PI;

    use super::*;

    fn sine(hz: f64, sample_rate: u32, frames: usize) -> Vec<f64> {
        (0..frames)
            .map(|i| (2.0 * PI * hz * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    #[test]
    fn test_candidate_grid() {
        let grid = CandidateGrid::for_midi_pitch(69);
        assert_eq!(200, grid.hz().len());
        assert!((grid.hz()[CandidateGrid::CENTER] - 440.0).abs() < 1e-9);
        assert!((grid.hz()[0] - midi_pitch_to_hz(68)).abs() < 1e-9);
        assert!(grid.hz().windows(2).all(|w| w[0] < w[1]));
        assert!(grid.lower_step() < grid.upper_step());
        assert_eq!(CandidateGrid::CENTER, grid.nearest_index(440.01));
        assert_eq!(0, grid.nearest_index(1.0));
        assert_eq!(199, grid.nearest_index(10_000.0));
    }

    #[test]
    fn test_recovers_grid_frequency() {
        let grid = CandidateGrid::for_midi_pitch(69);
        let hz = grid.hz()[CandidateGrid::CENTER];
        let signal = sine(hz, 48000, 48000);

        for config in [
            AutocorrelationConfig::default(),
            AutocorrelationConfig {
                upsample_factor: 1,
                ..Default::default()
            },
            AutocorrelationConfig {
                interp: Interpolation::Linear,
                upsample_interp: Interpolation::Linear,
                ..Default::default()
            },
        ] {
            let estimate = estimate_frequency(&signal, 24000, grid.hz(), 48000, &config).unwrap();
            assert_eq!(CandidateGrid::CENTER, estimate.candidate_index, "{:?}", config);
            assert_eq!(hz, estimate.hz);
            if config.interp == Interpolation::Cubic {
                assert!(estimate.cost < 1e-6, "cost {}", estimate.cost);
            }
        }
    }

    #[test]
    fn test_recovers_off_center_frequency() {
        let grid = CandidateGrid::for_midi_pitch(60);
        let hz = grid.hz()[130];
        let signal = sine(hz, 44100, 44100);

        let estimate = estimate_frequency(
            &signal,
            20000,
            grid.hz(),
            44100,
            &AutocorrelationConfig::default(),
        )
        .unwrap();
        assert_eq!(130, estimate.candidate_index);
    }

    #[test]
    fn test_anchor_out_of_range() {
        let grid = CandidateGrid::for_midi_pitch(69);
        let signal = sine(440.0, 48000, 4800);
        let err = estimate_frequency(
            &signal,
            100,
            grid.hz(),
            48000,
            &AutocorrelationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::AnchorOutOfRange { anchor: 100, .. }));

        let err = estimate_frequency(
            &signal,
            4700,
            grid.hz(),
            48000,
            &AutocorrelationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::AnchorOutOfRange { .. }));
    }

    #[test]
    fn test_no_candidates() {
        assert!(matches!(
            estimate_frequency(&[0.0; 100], 50, &[], 48000, &AutocorrelationConfig::default()),
            Err(AnalysisError::NoCandidates)
        ));
    }

    #[test]
    fn test_statistics() {
        let grid = CandidateGrid::for_midi_pitch(69);
        assert!(PitchStatistics::summarize(&[], &grid).is_none());

        let center = grid.hz()[CandidateGrid::CENTER];
        let stats = PitchStatistics::summarize(&[center, center, center], &grid).unwrap();
        assert_eq!(0.0, stats.error_cents);
        assert_eq!(0.0, stats.std_cents);
        assert!((stats.mean_hz - center).abs() < 1e-9);

        // Estimates five cents flat.
        let below = grid.hz()[95];
        let stats = PitchStatistics::summarize(&[below, below], &grid).unwrap();
        assert_eq!(-5.0, stats.error_cents);

        let spread = [grid.hz()[110], grid.hz()[112]];
        let stats = PitchStatistics::summarize(&spread, &grid).unwrap();
        assert_eq!(11.0, stats.error_cents);
        assert!((stats.std_cents - 1.0).abs() < 1e-9, "{}", stats.std_cents);
    }
}
