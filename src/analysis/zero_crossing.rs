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

//! Zero crossing search used to align snippets and loop points to the waveform.

/// Search direction for [find_zero_crossing].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Finds the nearest upward zero crossing at or beyond `start` in the given direction.
///
/// A crossing at index `i` means `x[i - 1] < 0.0 <= x[i]`. Returns `None` when the
/// search runs off either end of the signal.
pub fn find_zero_crossing(x: &[f64], start: usize, direction: Direction) -> Option<usize> {
    let mut i = start;
    while i > 0 && i < x.len() {
        if x[i - 1] < 0.0 && x[i] >= 0.0 {
            return Some(i);
        }
        i = match direction {
            Direction::Forward => i + 1,
            Direction::Backward => i - 1,
        };
    }
    None
}
