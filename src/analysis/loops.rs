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

//! Loop-point search: a single periodic segment whose ends splice seamlessly.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::zero_crossing::{find_zero_crossing, Direction};
use super::AnalysisError;

/// A loop `[begin, end)` and the boundary mismatch it was chosen with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopPoints {
    pub begin: usize,
    pub end: usize,
    pub cost: f64,
}

/// Mean squared difference between the `2 * window` samples straddling `a` and `b`.
fn boundary_cost(channel: &[f64], a: usize, b: usize, window: usize) -> f64 {
    let lhs = &channel[a - window..a + window];
    let rhs = &channel[b - window..b + window];
    lhs.iter()
        .zip(rhs)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        / (2 * window) as f64
}

/// Finds loop points near `[search_begin, search_end]`.
///
/// The loop end is fixed at the first upward zero crossing at or after `search_end`.
/// Loop start candidates are the first upward crossings at or after
/// `search_begin + g * nominal_cycle_len` for `g` in `0..guess_count`; the one whose
/// neighbourhood best matches the end's neighbourhood is chosen.
pub fn find_loop_points(
    channel: &[f64],
    search_begin: usize,
    search_end: usize,
    nominal_cycle_len: f64,
    match_window: usize,
    guess_count: usize,
) -> Result<LoopPoints, AnalysisError> {
    let no_candidate = AnalysisError::NoLoopCandidate {
        search_begin,
        search_end,
    };
    let window = match_window.max(1);

    let end = find_zero_crossing(channel, search_end, Direction::Forward)
        .filter(|&end| end + window <= channel.len())
        .ok_or(no_candidate)?;

    let mut candidates: Vec<usize> = Vec::with_capacity(guess_count);
    for g in 0..guess_count {
        let guess = search_begin + (g as f64 * nominal_cycle_len).round() as usize;
        let Some(begin) = find_zero_crossing(channel, guess, Direction::Forward) else {
            break;
        };
        if begin >= end {
            break;
        }
        if begin >= window && candidates.last() != Some(&begin) {
            candidates.push(begin);
        }
    }

    let best = candidates
        .into_iter()
        .map(|begin| LoopPoints {
            begin,
            end,
            cost: boundary_cost(channel, begin, end, window),
        })
        .fold(None, |best: Option<LoopPoints>, c| match best {
            Some(b) if b.cost <= c.cost => Some(b),
            _ => Some(c),
        })
        .ok_or(AnalysisError::NoLoopCandidate {
            search_begin,
            search_end,
        })?;

    if best.begin >= best.end {
        return Err(AnalysisError::LoopOrder {
            begin: best.begin,
            end: best.end,
        });
    }

    debug!(
        begin = best.begin,
        end = best.end,
        cost = best.cost,
        "Found loop points"
    );
    Ok(best)
}
