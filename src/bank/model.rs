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

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ExtractionConfig;

use super::BankError;

/// One zero-crossing aligned snippet of one channel, roughly two fundamental periods long.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavetableDescriptor {
    /// First sample of the snippet.
    pub begin: usize,
    /// One past the last sample of the snippet.
    pub end: usize,
    /// Linear RMS of the snippet.
    pub rms: f64,
    /// Pitch estimate for the whole note, in Hz.
    pub estimated_hz: f64,
}

impl WavetableDescriptor {
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.begin
    }
}

/// A loop found by the loop-point search on one channel of one note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopSegment {
    pub channel: usize,
    pub begin: usize,
    pub end: usize,
    /// Mean squared mismatch between the neighbourhoods of the loop ends.
    pub cost: f64,
}

/// Everything extracted from one recorded note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityRecord {
    pub velocity: u8,
    /// Sample index of the note onset.
    pub attack_begin: usize,
    /// Sample index of the end of the attack gate.
    pub attack_end: usize,
    /// Time ordered wavetables per channel.
    pub channels: Vec<Vec<WavetableDescriptor>>,
    /// Loop segments, present when the loop-point search was enabled.
    #[serde(default)]
    pub loops: Vec<LoopSegment>,
}

/// Everything extracted for one MIDI pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchRecord {
    pub midi_pitch: u8,
    pub sample_rate: u32,
    pub estimated_hz_mean: f64,
    pub estimated_hz_error_cents: f64,
    pub estimated_hz_std_cents: f64,
    /// Time between successive stored wavetables, in seconds.
    pub wavetable_interval_secs: f64,
    pub dominant_channel: usize,
    pub source_audio: PathBuf,
    pub source_markers: PathBuf,
    pub velocities: Vec<VelocityRecord>,
}

/// The persisted artifact of an extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub instrument_name: String,
    /// The configuration the bank was extracted with.
    pub extraction_config: ExtractionConfig,
    /// Pitch records ordered by MIDI pitch.
    pub pitches: Vec<PitchRecord>,
}

impl Bank {
    /// Assembles a bank, ordering the records by pitch.
    pub fn new(extraction_config: ExtractionConfig, mut pitches: Vec<PitchRecord>) -> Self {
        pitches.sort_by_key(|p| p.midi_pitch);
        Self {
            instrument_name: extraction_config.instrument_name.clone(),
            extraction_config,
            pitches,
        }
    }

    /// Looks up the record for a pitch.
    pub fn pitch(&self, midi_pitch: u8) -> Option<&PitchRecord> {
        self.pitches.iter().find(|p| p.midi_pitch == midi_pitch)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), BankError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(
            path = ?path,
            instrument = %self.instrument_name,
            pitches = self.pitches.len(),
            "Wrote wavetable bank"
        );
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self, BankError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(midi_pitch: u8) -> PitchRecord {
        PitchRecord {
            midi_pitch,
            sample_rate: 48000,
            estimated_hz_mean: 440.123_456_789,
            estimated_hz_error_cents: -3.0,
            estimated_hz_std_cents: 0.1 + 0.2,
            wavetable_interval_secs: 2.0,
            dominant_channel: 1,
            source_audio: PathBuf::from(format!("wav/{:03}_samples.wav", midi_pitch)),
            source_markers: PathBuf::from(format!("{:03}_marker.txt", midi_pitch)),
            velocities: vec![VelocityRecord {
                velocity: 90,
                attack_begin: 144000,
                attack_end: 146400,
                channels: vec![
                    vec![
                        WavetableDescriptor {
                            begin: 146410,
                            end: 146628,
                            rms: 0.353_553_390_593_273_8,
                            estimated_hz: 440.123_456_789,
                        },
                        WavetableDescriptor {
                            begin: 242410,
                            end: 242628,
                            rms: 1e-5,
                            estimated_hz: 440.123_456_789,
                        },
                    ],
                    vec![],
                ],
                loops: vec![LoopSegment {
                    channel: 0,
                    begin: 230000,
                    end: 234800,
                    cost: 1.5e-9,
                }],
            }],
        }
    }

    #[test]
    fn test_new_sorts_by_pitch() {
        let bank = Bank::new(
            ExtractionConfig::default(),
            vec![record(70), record(21), record(69)],
        );
        assert_eq!(
            vec![21, 69, 70],
            bank.pitches.iter().map(|p| p.midi_pitch).collect::<Vec<_>>()
        );
        assert_eq!("piano", bank.instrument_name);
        assert_eq!(Some(69), bank.pitch(69).map(|p| p.midi_pitch));
        assert!(bank.pitch(100).is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        let bank = Bank::new(ExtractionConfig::default(), vec![record(69), record(33)]);

        bank.write_json(&path).unwrap();
        let read = Bank::read_json(&path).unwrap();

        assert_eq!(bank, read);
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        fs::write(&path, "{\"instrument_name\": 3}").unwrap();
        assert!(matches!(Bank::read_json(&path), Err(BankError::Json(_))));
        assert!(matches!(
            Bank::read_json(&dir.path().join("missing.json")),
            Err(BankError::Io(_))
        ));
    }
}
