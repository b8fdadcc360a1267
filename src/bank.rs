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

//! The wavetable bank: the persisted result of an extraction run and the sole input
//! to resynthesis.

pub mod extract;
pub mod model;

pub use extract::{extract_bank, find_note_loops, ExtractError};
pub use model::{Bank, LoopSegment, PitchRecord, VelocityRecord, WavetableDescriptor};

/// Typed error for bank persistence.
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("Unable to serialize bank: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
