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

//! Batch jobs tying file access, analysis, extraction and resynthesis together.
//!
//! Each pitch is an independent job. Batches fan the jobs out through
//! [crate::distribute] and abort on the first failure, so a bank is only ever
//! written complete.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::analysis::{compute_gates, gate_audio, gates_to_markers, AnalysisError, GateAnalysis};
use crate::audio::{read_samples, write_samples, AudioError, SampleBuffer};
use crate::bank::{
    extract_bank, find_note_loops, Bank, BankError, ExtractError, LoopSegment, PitchRecord,
};
use crate::config::{ExtractionConfig, SynthConfig};
use crate::distribute::{run_with, DistributeError, PoolOptions};
use crate::markers::{read_markers, write_markers, Marker, MarkerError};
use crate::synth::{render_pitch, SynthError};
use crate::util::{
    filename_display, gated_audio_path, gates_path, loops_path, marker_path, oscillator_path,
    samples_path,
};

/// Typed error for a failed job or batch. Per-pitch failures name the pitch.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pitch {midi_pitch}: {}: {source}", path.display())]
    Audio {
        midi_pitch: u8,
        path: PathBuf,
        source: AudioError,
    },

    #[error("pitch {midi_pitch}: {}: {source}", path.display())]
    Markers {
        midi_pitch: u8,
        path: PathBuf,
        source: MarkerError,
    },

    #[error("pitch {midi_pitch}: {source}")]
    Gates {
        midi_pitch: u8,
        source: AnalysisError,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("pitch {midi_pitch}: {source}")]
    Synth { midi_pitch: u8, source: SynthError },

    #[error("pitch {midi_pitch}: worker panicked: {message}")]
    Panic { midi_pitch: u8, message: String },

    #[error("No worker reported back within {0:?}")]
    Timeout(Duration),

    #[error("Batch was cancelled")]
    Cancelled,

    #[error("Worker pool shut down before every pitch reported back")]
    Disconnected,

    #[error("{}: {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Bank(#[from] BankError),
}

impl PipelineError {
    /// Unwraps a batch failure, naming the pitch of the task that failed.
    fn from_batch(err: DistributeError<PipelineError>, pitches: &[u8]) -> Self {
        match err {
            DistributeError::Task { source, .. } => source,
            DistributeError::Panic { index, message } => PipelineError::Panic {
                midi_pitch: pitches.get(index).copied().unwrap_or_default(),
                message,
            },
            DistributeError::Timeout(timeout) => PipelineError::Timeout(timeout),
            DistributeError::Cancelled => PipelineError::Cancelled,
            DistributeError::Disconnected => PipelineError::Disconnected,
        }
    }
}

/// A pitch's recording and note markers.
struct PitchSource {
    buffer: SampleBuffer,
    markers: Vec<Marker>,
    audio_path: PathBuf,
    marker_path: PathBuf,
}

fn load_pitch(source_dir: &Path, midi_pitch: u8) -> Result<PitchSource, PipelineError> {
    let audio_path = samples_path(source_dir, midi_pitch);
    let marker_path = marker_path(source_dir, midi_pitch);
    let buffer = read_samples(&audio_path).map_err(|source| PipelineError::Audio {
        midi_pitch,
        path: audio_path.clone(),
        source,
    })?;
    let markers = read_markers(&marker_path).map_err(|source| PipelineError::Markers {
        midi_pitch,
        path: marker_path.clone(),
        source,
    })?;
    Ok(PitchSource {
        buffer,
        markers,
        audio_path,
        marker_path,
    })
}

fn detect_gates(
    config: &ExtractionConfig,
    midi_pitch: u8,
    source: &PitchSource,
) -> Result<GateAnalysis, PipelineError> {
    compute_gates(&source.buffer, &source.markers, &config.envelope, &config.gate)
        .map_err(|source| PipelineError::Gates { midi_pitch, source })
}

fn create_dir(dir: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dir).map_err(|source| PipelineError::Output {
        path: dir.to_path_buf(),
        source,
    })
}

/// Extracts the pitch record for one MIDI pitch from the source directory.
pub fn extract_pitch(config: &ExtractionConfig, midi_pitch: u8) -> Result<PitchRecord, PipelineError> {
    let source = load_pitch(&config.source_dir, midi_pitch)?;
    info!(
        midi_pitch,
        file = filename_display(&source.audio_path),
        notes = source.markers.len(),
        "Extracting pitch"
    );

    let gates = detect_gates(config, midi_pitch, &source)?;
    let record = extract_bank(
        &source.buffer,
        &source.markers,
        &gates.gates,
        midi_pitch,
        gates.dominant_channel(),
        config,
    )?;
    Ok(record.with_sources(source.audio_path, source.marker_path))
}

/// Extracts every configured pitch in parallel and writes the bank to the
/// configured output path. Nothing is written if any pitch fails.
pub fn extract_bank_batch(config: &ExtractionConfig) -> Result<Bank, PipelineError> {
    let pitches = config.midi_pitches.clone();
    info!(
        instrument = %config.instrument_name,
        pitches = pitches.len(),
        workers = config.worker_count,
        "Extracting wavetable bank"
    );

    let options =
        PoolOptions::new(config.worker_count).with_liveness_timeout(config.liveness_timeout());
    let records = run_with(
        &options,
        pitches.clone(),
        config.clone(),
        |config: &ExtractionConfig, midi_pitch: u8| extract_pitch(config, midi_pitch),
    )
    .map_err(|e| PipelineError::from_batch(e, &pitches))?;

    let bank = Bank::new(config.clone(), records);
    if let Some(parent) = config.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir(parent)?;
        }
    }
    bank.write_json(&config.output_path)?;
    Ok(bank)
}

/// Renders one pitch of a bank to `<output_dir>/<ppp>_osc.wav`.
fn render_record(config: &SynthConfig, record: &PitchRecord) -> Result<PathBuf, PipelineError> {
    let midi_pitch = record.midi_pitch;
    let source = read_samples(&record.source_audio).map_err(|source| PipelineError::Audio {
        midi_pitch,
        path: record.source_audio.clone(),
        source,
    })?;
    let output = render_pitch(record, &source, config)
        .map_err(|source| PipelineError::Synth { midi_pitch, source })?;

    let path = oscillator_path(&config.output_dir, midi_pitch);
    write_samples(&path, &output).map_err(|source| PipelineError::Audio {
        midi_pitch,
        path: path.clone(),
        source,
    })?;
    info!(midi_pitch, file = filename_display(&path), "Rendered pitch");
    Ok(path)
}

/// Resynthesizes every selected pitch of a bank in parallel. Returns the written
/// files ordered by pitch.
pub fn render_bank(bank: &Bank, config: &SynthConfig) -> Result<Vec<PathBuf>, PipelineError> {
    let records: Vec<PitchRecord> = bank
        .pitches
        .iter()
        .filter(|p| config.includes(p.midi_pitch))
        .cloned()
        .collect();
    let pitches: Vec<u8> = records.iter().map(|r| r.midi_pitch).collect();
    info!(
        instrument = %bank.instrument_name,
        pitches = pitches.len(),
        "Rendering wavetable bank"
    );
    create_dir(&config.output_dir)?;

    let options =
        PoolOptions::new(config.worker_count).with_liveness_timeout(config.liveness_timeout());
    let mut paths = run_with(&options, records, config.clone(), |config, record| {
        render_record(config, &record)
    })
    .map_err(|e| PipelineError::from_batch(e, &pitches))?;
    paths.sort();
    Ok(paths)
}

/// Detects the gates of one pitch and writes them as markers plus a copy of the
/// recording silenced outside the gates.
pub fn export_gates(
    config: &ExtractionConfig,
    midi_pitch: u8,
    out_dir: &Path,
) -> Result<GateAnalysis, PipelineError> {
    let source = load_pitch(&config.source_dir, midi_pitch)?;
    let gates = detect_gates(config, midi_pitch, &source)?;
    create_dir(out_dir)?;

    let markers_path = gates_path(out_dir, midi_pitch);
    write_markers(
        &markers_path,
        &gates_to_markers(&gates.gates, source.buffer.sample_rate()),
    )
    .map_err(|source| PipelineError::Markers {
        midi_pitch,
        path: markers_path.clone(),
        source,
    })?;

    let audio_path = gated_audio_path(out_dir, midi_pitch);
    write_samples(&audio_path, &gate_audio(&source.buffer, &gates.gates)).map_err(|source| {
        PipelineError::Audio {
            midi_pitch,
            path: audio_path.clone(),
            source,
        }
    })?;

    info!(
        midi_pitch,
        gates = gates.gates.len(),
        forced = gates.gates.iter().filter(|g| g.forced).count(),
        "Exported gates"
    );
    Ok(gates)
}

/// Runs the loop-point search over every note of one pitch and writes the loops as
/// markers labelled `ch:<channel> <ln cost>`.
pub fn export_loops(
    config: &ExtractionConfig,
    midi_pitch: u8,
    out_dir: &Path,
) -> Result<Vec<LoopSegment>, PipelineError> {
    let source = load_pitch(&config.source_dir, midi_pitch)?;
    let search = config.loop_search.clone().unwrap_or_default();
    let sample_rate = source.buffer.sample_rate() as f64;

    let mut loops = Vec::new();
    for marker in &source.markers {
        loops.extend(find_note_loops(&source.buffer, marker, midi_pitch, &search)?);
    }

    create_dir(out_dir)?;
    let path = loops_path(out_dir, midi_pitch);
    let markers: Vec<Marker> = loops
        .iter()
        .map(|l| {
            Marker::new(
                l.begin as f64 / sample_rate,
                l.end as f64 / sample_rate,
                format!("ch:{} {:.2}", l.channel, l.cost.ln()),
            )
        })
        .collect();
    write_markers(&path, &markers).map_err(|source| PipelineError::Markers {
        midi_pitch,
        path: path.clone(),
        source,
    })?;

    info!(midi_pitch, loops = loops.len(), "Exported loops");
    Ok(loops)
}
