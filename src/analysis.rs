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

//! Signal analysis stages of the extraction pipeline.
//!
//! Everything here is a pure, single-threaded computation over borrowed sample
//! slices. Parallelism lives in [crate::distribute] only.

pub mod envelope;
pub mod gate;
pub mod interp;
pub mod knee;
pub mod loops;
pub mod pitch;
pub mod zero_crossing;

pub use envelope::{rms_envelope, EnvelopeGeometry, EnvelopeScale};
pub use gate::{compute_gates, gate_audio, gates_to_markers, Gate, GateAnalysis};
pub use loops::{find_loop_points, LoopPoints};
pub use pitch::{estimate_frequency, CandidateGrid, PitchEstimate, PitchStatistics};
pub use zero_crossing::{find_zero_crossing, Direction};

/// Errors raised by the analysis stages.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("RMS window of {window} samples must be a multiple of, and longer than, the {hop} sample hop")]
    InvalidEnvelope { window: usize, hop: usize },

    #[error("Buffer of {frames} frames is shorter than one {window} sample RMS window")]
    BufferTooShort { frames: usize, window: usize },

    #[error("No note markers to analyse")]
    NoMarkers,

    #[error("Gate {index} begins at {begin} but the previous gate ends at {previous_end}")]
    GateOverlap {
        index: usize,
        previous_end: usize,
        begin: usize,
    },

    #[error("Pitch anchor {anchor} needs samples [{first}, {last}] but the channel has {len}")]
    AnchorOutOfRange {
        anchor: usize,
        first: i64,
        last: i64,
        len: usize,
    },

    #[error("No candidate frequencies given")]
    NoCandidates,

    #[error("No loop start candidate found in [{search_begin}, {search_end})")]
    NoLoopCandidate {
        search_begin: usize,
        search_end: usize,
    },

    #[error("Loop search produced begin {begin} >= end {end}")]
    LoopOrder { begin: usize, end: usize },
}
