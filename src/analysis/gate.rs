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

//! Attack gate detection.
//!
//! Each note's gate spans from its marker onset to the end of its attack transient.
//! The sustain that follows the gate is what the wavetable extractor samples.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audio::SampleBuffer;
use crate::config::{EnvelopeConfig, GateConfig, GateDetectionStrategy};
use crate::markers::Marker;
use crate::util::ms_to_samples;

use super::envelope::{channel_envelopes, channel_means, EnvelopeGeometry, EnvelopeScale};
use super::knee::locate_knee;
use super::AnalysisError;

/// The attack window of one note, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub begin: usize,
    pub end: usize,
    /// True when detection failed and the end was placed by the fallback rule
    /// rather than by an observed energy transition.
    #[serde(default)]
    pub forced: bool,
}

impl Gate {
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.begin
    }
}

/// Gates for every note of a recording plus the per-channel mean energy.
#[derive(Debug, Clone, PartialEq)]
pub struct GateAnalysis {
    pub gates: Vec<Gate>,
    /// Mean envelope value of each channel, in the strategy's envelope units.
    pub channel_energy: Vec<f64>,
}

impl GateAnalysis {
    /// The channel with the highest mean energy. Ties go to the lowest index.
    pub fn dominant_channel(&self) -> usize {
        dominant_index(&self.channel_energy)
    }
}

/// Online gate state for the note currently being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    /// The attack transient has not risen above the threshold yet; the gate may not close.
    PendingAttack,
    /// The gate is open and closes the first time energy drops below the threshold.
    Active,
    /// The end of attack has been recorded for this note.
    GatedOff,
}

/// Locates the attack gate of every note.
pub fn compute_gates(
    buffer: &SampleBuffer,
    markers: &[Marker],
    envelope: &EnvelopeConfig,
    config: &GateConfig,
) -> Result<GateAnalysis, AnalysisError> {
    if markers.is_empty() {
        return Err(AnalysisError::NoMarkers);
    }

    let sample_rate = buffer.sample_rate();
    let geometry = EnvelopeGeometry::from_config(envelope, sample_rate)?;
    let min_gate = ms_to_samples(config.min_gate_ms, sample_rate);
    let onsets: Vec<usize> = markers.iter().map(|m| m.begin_sample(sample_rate)).collect();

    let (ends, channel_energy) = match config.strategy {
        GateDetectionStrategy::ThresholdDb { threshold_db } => {
            let envelopes = channel_envelopes(buffer, geometry, EnvelopeScale::Decibels)?;
            let channel_energy = channel_means(&envelopes);
            let dominant = dominant_index(&channel_energy);
            let ends = threshold_ends(
                &envelopes[dominant],
                geometry.hop(),
                &onsets,
                threshold_db,
            );
            (ends, channel_energy)
        }
        GateDetectionStrategy::PeakPercentDecay { fraction } => {
            let envelopes = channel_envelopes(buffer, geometry, EnvelopeScale::Linear)?;
            let channel_energy = channel_means(&envelopes);
            let ends = markers
                .iter()
                .zip(&onsets)
                .map(|(marker, &onset)| {
                    peak_decay_end(
                        &envelopes,
                        geometry.hop(),
                        onset,
                        marker.end_sample(sample_rate),
                        fraction,
                    )
                })
                .collect();
            (ends, channel_energy)
        }
        GateDetectionStrategy::KneeCurve {
            offset_hops,
            smoothing_hops,
        } => {
            let envelopes = channel_envelopes(buffer, geometry, EnvelopeScale::Decibels)?;
            let channel_energy = channel_means(&envelopes);
            let dominant = dominant_index(&channel_energy);
            let ends = markers
                .iter()
                .zip(&onsets)
                .map(|(marker, &onset)| {
                    knee_end(
                        &envelopes[dominant],
                        geometry.hop(),
                        onset,
                        marker.end_sample(sample_rate),
                        offset_hops,
                        smoothing_hops,
                    )
                })
                .collect();
            (ends, channel_energy)
        }
    };

    // A final note that never decays below an absolute threshold rings to the end
    // of the recording. The relative strategies fall back to the minimum gate.
    let final_fallback = match config.strategy {
        GateDetectionStrategy::ThresholdDb { .. } => Some(buffer.frame_count().saturating_sub(1)),
        _ => None,
    };
    let gates = finalize_gates(&onsets, ends, min_gate, final_fallback)?;
    debug!(
        notes = gates.len(),
        forced = gates.iter().filter(|g| g.forced).count(),
        "Computed attack gates"
    );

    Ok(GateAnalysis {
        gates,
        channel_energy,
    })
}

fn dominant_index(channel_energy: &[f64]) -> usize {
    channel_energy
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &e)| {
            if e > best.1 {
                (i, e)
            } else {
                best
            }
        })
        .0
}

/// Runs the threshold state machine over the dominant channel's dB envelope.
/// Returns the detected end of attack per note, `None` where the gate never closed.
fn threshold_ends(
    envelope: &[f64],
    hop: usize,
    onsets: &[usize],
    threshold_db: f64,
) -> Vec<Option<usize>> {
    let mut ends: Vec<Option<usize>> = vec![None; onsets.len()];
    let mut note: Option<usize> = None;
    let mut next = 0;
    let mut state = GateState::PendingAttack;

    for (i, &level) in envelope.iter().enumerate() {
        let sample = i * hop;

        // Crossing into the next note's nominal onset. A note still open here never
        // gated off and is left undetected.
        while next < onsets.len() && onsets[next] <= sample {
            note = Some(next);
            next += 1;
            state = GateState::PendingAttack;
        }

        let Some(k) = note else {
            continue;
        };

        state = match state {
            GateState::PendingAttack if level > threshold_db => GateState::Active,
            GateState::Active if level < threshold_db => {
                ends[k] = Some(sample);
                GateState::GatedOff
            }
            other => other,
        };
    }

    ends
}

/// End of attack for one note: the first envelope value after the note's peak RMS
/// (across all channels) that falls below `fraction` of that peak.
fn peak_decay_end(
    envelopes: &[Vec<f64>],
    hop: usize,
    onset: usize,
    end: usize,
    fraction: f64,
) -> Option<usize> {
    let env_len = envelopes.first().map_or(0, Vec::len);
    let begin = (onset / hop).min(env_len);
    let end = (end / hop).min(env_len);
    if begin >= end {
        return None;
    }

    let (peak_channel, peak_index, peak) = envelopes
        .iter()
        .enumerate()
        .flat_map(|(ch, env)| {
            env[begin..end]
                .iter()
                .enumerate()
                .map(move |(i, &v)| (ch, begin + i, v))
        })
        .fold((0, begin, f64::NEG_INFINITY), |best, candidate| {
            if candidate.2 > best.2 {
                candidate
            } else {
                best
            }
        });

    let threshold = peak * fraction;
    envelopes[peak_channel][peak_index + 1..end]
        .iter()
        .position(|&v| v < threshold)
        .map(|offset| (peak_index + 1 + offset) * hop)
}

/// End of attack for one note at the knee of its dB envelope.
fn knee_end(
    envelope: &[f64],
    hop: usize,
    onset: usize,
    end: usize,
    offset_hops: usize,
    smoothing_hops: usize,
) -> Option<usize> {
    let begin = ((onset as f64 / hop as f64).round() as usize + offset_hops).min(envelope.len());
    let end = ((end as f64 / hop as f64).round() as usize).min(envelope.len());
    if begin >= end {
        return None;
    }
    locate_knee(&envelope[begin..end], smoothing_hops).map(|knee| (begin + knee) * hop)
}

/// Applies the fallback for undetected ends, enforces the minimum gate length by
/// extending forward, and checks that consecutive gates are strictly ordered.
///
/// Undetected gates close at `onset + min_gate`, or at `final_fallback` for the
/// last note when given.
fn finalize_gates(
    onsets: &[usize],
    ends: Vec<Option<usize>>,
    min_gate: usize,
    final_fallback: Option<usize>,
) -> Result<Vec<Gate>, AnalysisError> {
    let last = onsets.len() - 1;
    let mut gates = Vec::with_capacity(onsets.len());

    for (index, (&begin, end)) in onsets.iter().zip(ends).enumerate() {
        let (end, forced) = match end {
            Some(end) => (end, false),
            None => {
                let end = match final_fallback {
                    Some(end) if index == last => end,
                    _ => begin + min_gate,
                };
                warn!(
                    note = index,
                    onset = begin,
                    forced_end = end,
                    "No end of attack detected, forcing gate closed"
                );
                (end, true)
            }
        };
        let end = end.max(begin + min_gate);

        if let Some(previous) = gates.last().map(|g: &Gate| g.end) {
            if begin <= previous {
                return Err(AnalysisError::GateOverlap {
                    index,
                    previous_end: previous,
                    begin,
                });
            }
        }
        gates.push(Gate { begin, end, forced });
    }

    Ok(gates)
}

/// Converts gates to markers labelled with the note index.
pub fn gates_to_markers(gates: &[Gate], sample_rate: u32) -> Vec<Marker> {
    let rate = sample_rate as f64;
    gates
        .iter()
        .enumerate()
        .map(|(i, g)| Marker::new(g.begin as f64 / rate, g.end as f64 / rate, i.to_string()))
        .collect()
}

/// Returns a copy of the buffer with everything outside the gates silenced.
pub fn gate_audio(buffer: &SampleBuffer, gates: &[Gate]) -> SampleBuffer {
    let mut gated = SampleBuffer::silent(
        buffer.channel_count(),
        buffer.frame_count(),
        buffer.sample_rate(),
    );
    for channel in 0..buffer.channel_count() {
        let source = buffer.channel(channel);
        let target = gated.channel_mut(channel);
        for gate in gates {
            let end = gate.end.min(source.len());
            let begin = gate.begin.min(end);
            target[begin..end].copy_from_slice(&source[begin..end]);
        }
    }
    gated
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::SampleBuffer;

    const RATE: u32 = 1000;

    /// A square wave whose amplitude follows `amplitude(i)`.
    fn square(frames: usize, amplitude: impl Fn(usize) -> f64) -> Vec<f64> {
        (0..frames)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 } * amplitude(i))
            .collect()
    }

    /// Notes at 0s, 3s and 6s: loud for `loud_ms`, then quiet until the next note.
    fn decaying_notes(loud_ms: usize) -> (SampleBuffer, Vec<Marker>) {
        let frames = 9 * RATE as usize;
        let left = square(frames, |i| {
            let within = i % 3000;
            if within < loud_ms {
                0.5
            } else {
                0.001
            }
        });
        let right: Vec<f64> = left.iter().map(|s| s * 0.5).collect();
        let buffer = SampleBuffer::new(vec![left, right], RATE).unwrap();
        let markers = vec![
            Marker::new(0.0, 2.05, "40"),
            Marker::new(3.0, 5.05, "90"),
            Marker::new(6.0, 8.05, "127"),
        ];
        (buffer, markers)
    }

    fn config(strategy: GateDetectionStrategy, min_gate_ms: f64) -> GateConfig {
        GateConfig {
            strategy,
            min_gate_ms,
        }
    }

    fn assert_ordered(gates: &[Gate], min_gate: usize) {
        for pair in gates.windows(2) {
            assert!(pair[0].end < pair[1].begin);
        }
        for gate in gates {
            assert!(gate.len() >= min_gate);
        }
    }

    #[test]
    fn test_threshold_gates() {
        let (buffer, markers) = decaying_notes(500);
        let analysis = compute_gates(
            &buffer,
            &markers,
            &EnvelopeConfig::default(),
            &config(
                GateDetectionStrategy::ThresholdDb {
                    threshold_db: -30.0,
                },
                100.0,
            ),
        )
        .unwrap();

        assert_eq!(0, analysis.dominant_channel());
        assert_eq!(3, analysis.gates.len());
        for (gate, onset) in analysis.gates.iter().zip([0, 3000, 6000]) {
            assert_eq!(onset, gate.begin);
            assert!(!gate.forced);
            // The envelope drops below -30 dB shortly after the loud section ends.
            assert!(
                (onset + 480..=onset + 560).contains(&gate.end),
                "gate {:?}",
                gate
            );
        }
        assert_ordered(&analysis.gates, 100);
    }

    #[test]
    fn test_threshold_gates_extend_to_minimum() {
        let (buffer, markers) = decaying_notes(200);
        let analysis = compute_gates(
            &buffer,
            &markers,
            &EnvelopeConfig::default(),
            &config(
                GateDetectionStrategy::ThresholdDb {
                    threshold_db: -30.0,
                },
                1000.0,
            ),
        )
        .unwrap();

        for (gate, onset) in analysis.gates.iter().zip([0, 3000, 6000]) {
            assert_eq!(onset + 1000, gate.end);
        }
        assert_ordered(&analysis.gates, 1000);
    }

    #[test]
    fn test_threshold_pending_attack_blocks_early_close() {
        // Each note starts silent for 300 ms before its transient arrives.
        let frames = 6 * RATE as usize;
        let samples = square(frames, |i| {
            let within = i % 3000;
            if (300..800).contains(&within) {
                0.5
            } else {
                0.0
            }
        });
        let buffer = SampleBuffer::new(vec![samples], RATE).unwrap();
        let markers = vec![Marker::new(0.0, 2.0, "64"), Marker::new(3.0, 5.0, "64")];

        let analysis = compute_gates(
            &buffer,
            &markers,
            &EnvelopeConfig::default(),
            &config(
                GateDetectionStrategy::ThresholdDb {
                    threshold_db: -30.0,
                },
                0.0,
            ),
        )
        .unwrap();

        for (gate, onset) in analysis.gates.iter().zip([0, 3000]) {
            assert!(gate.end >= onset + 780, "gate {:?}", gate);
            assert!(gate.end <= onset + 860, "gate {:?}", gate);
        }
    }

    #[test]
    fn test_threshold_never_decays_forces_fallback() {
        // Constant loud tone: no note ever gates off.
        let buffer = SampleBuffer::new(vec![square(9000, |_| 0.5)], RATE).unwrap();
        let markers = vec![
            Marker::new(0.0, 2.0, "1"),
            Marker::new(3.0, 5.0, "2"),
            Marker::new(6.0, 8.0, "3"),
        ];

        let analysis = compute_gates(
            &buffer,
            &markers,
            &EnvelopeConfig::default(),
            &config(
                GateDetectionStrategy::ThresholdDb {
                    threshold_db: -30.0,
                },
                500.0,
            ),
        )
        .unwrap();

        assert_eq!(500, analysis.gates[0].end);
        assert_eq!(3500, analysis.gates[1].end);
        assert_eq!(8999, analysis.gates[2].end);
        assert!(analysis.gates.iter().all(|g| g.forced || g.end == 8999));
    }

    #[test]
    fn test_overlap_is_reported() {
        let buffer = SampleBuffer::new(vec![square(3000, |_| 0.5)], RATE).unwrap();
        let markers = vec![Marker::new(0.0, 0.4, "1"), Marker::new(0.5, 2.0, "2")];

        let err = compute_gates(
            &buffer,
            &markers,
            &EnvelopeConfig::default(),
            &config(
                GateDetectionStrategy::ThresholdDb {
                    threshold_db: -30.0,
                },
                1000.0,
            ),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::GateOverlap { index: 1, .. }));
    }

    #[test]
    fn test_peak_percent_decay() {
        let (buffer, markers) = decaying_notes(400);
        let analysis = compute_gates(
            &buffer,
            &markers,
            &EnvelopeConfig::default(),
            &config(GateDetectionStrategy::PeakPercentDecay { fraction: 0.1 }, 50.0),
        )
        .unwrap();

        for (gate, onset) in analysis.gates.iter().zip([0, 3000, 6000]) {
            assert!(!gate.forced);
            assert!(
                (onset + 390..=onset + 460).contains(&gate.end),
                "gate {:?}",
                gate
            );
        }
        assert_ordered(&analysis.gates, 50);
    }

    #[test]
    fn test_knee_curve() {
        // Exponential decay onto a noise floor; the knee sits where the floor takes over.
        let frames = 6 * RATE as usize;
        let samples = square(frames, |i| {
            let t = (i % 3000) as f64 / RATE as f64;
            0.5 * (-8.0 * t).exp() + 0.005
        });
        let buffer = SampleBuffer::new(vec![samples], RATE).unwrap();
        let markers = vec![Marker::new(0.0, 2.0, "64"), Marker::new(3.0, 5.0, "64")];

        let analysis = compute_gates(
            &buffer,
            &markers,
            &EnvelopeConfig::default(),
            &config(
                GateDetectionStrategy::KneeCurve {
                    offset_hops: 10,
                    smoothing_hops: 0,
                },
                50.0,
            ),
        )
        .unwrap();

        for (gate, onset) in analysis.gates.iter().zip([0, 3000]) {
            assert!(!gate.forced);
            assert!(gate.end > onset + 100 && gate.end < onset + 1900, "gate {:?}", gate);
        }
        assert_ordered(&analysis.gates, 50);
    }

    #[test]
    fn test_gate_exports() {
        let buffer = SampleBuffer::new(vec![vec![1.0; 10], vec![-1.0; 10]], RATE).unwrap();
        let gates = vec![
            Gate {
                begin: 1,
                end: 3,
                forced: false,
            },
            Gate {
                begin: 6,
                end: 12,
                forced: true,
            },
        ];

        let gated = gate_audio(&buffer, &gates);
        assert_eq!(
            &[0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            gated.channel(0)
        );
        assert_eq!(-1.0, gated.channel(1)[2]);
        assert_eq!(1.0, buffer.channel(0)[0]);

        let markers = gates_to_markers(&gates, RATE);
        assert_eq!(Marker::new(0.001, 0.003, "0"), markers[0]);
        assert_eq!(Marker::new(0.006, 0.012, "1"), markers[1]);
    }

    #[test]
    fn test_no_markers() {
        let buffer = SampleBuffer::silent(1, 1000, RATE);
        assert!(matches!(
            compute_gates(&buffer, &[], &EnvelopeConfig::default(), &GateConfig::default()),
            Err(AnalysisError::NoMarkers)
        ));
    }
}
