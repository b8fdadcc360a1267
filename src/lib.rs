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

//! Extracts banks of single-cycle wavetables from multi-velocity instrument
//! recordings and resynthesizes notes from them.

pub mod analysis;
pub mod audio;
pub mod bank;
pub mod config;
pub mod distribute;
pub mod markers;
pub mod pipeline;
pub mod synth;
pub mod util;

#[cfg(test)]
mod testutil;
