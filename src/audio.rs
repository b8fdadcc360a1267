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

//! Access to multi-channel PCM recordings.
//!
//! Recordings are decoded into a planar, normalized [SampleBuffer] that every
//! analysis stage borrows read-only. Output is written back as 32-bit integer PCM.

pub mod buffer;
pub mod error;
pub mod reader;
pub mod writer;

pub use buffer::SampleBuffer;
pub use error::AudioError;
pub use reader::read_samples;
pub use writer::write_samples;
