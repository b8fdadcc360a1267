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

//! Resynthesis of recorded notes from their extracted wavetables.

pub mod oscillator;
pub mod render;

pub use oscillator::{synthesize, WavetableOscillator};
pub use render::render_pitch;

/// Typed error for resynthesis failures.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("Wavetable [{begin}, {end}) lies outside the {len} sample source")]
    TableOutOfRange { begin: usize, end: usize, len: usize },

    #[error("Wavetables of one note differ in length ({expected} and {found})")]
    TableLength { expected: usize, found: usize },

    #[error("Velocity {velocity} has {found} channels but the source has {expected}")]
    ChannelCount {
        velocity: u8,
        expected: usize,
        found: usize,
    },

    #[error("Pitch was extracted at {expected} Hz but the source is {found} Hz")]
    SampleRate { expected: u32, found: u32 },

    #[error("Note onset {onset} lies past the end of the {len} sample source")]
    OnsetOutOfRange { onset: usize, len: usize },
}
