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

//! Knee location on decreasing convex curves (the Kneedle difference-curve method).

/// Curves spanning less than this are treated as flat.
const FLAT_TOLERANCE: f64 = 1e-6;

/// Centered moving average. Lengths below 2 return the input unchanged.
fn smooth(y: &[f64], length: usize) -> Vec<f64> {
    if length < 2 || y.len() < 2 {
        return y.to_vec();
    }
    let half = length / 2;
    (0..y.len())
        .map(|i| {
            let begin = i.saturating_sub(half);
            let end = (i + length - half).min(y.len());
            y[begin..end].iter().sum::<f64>() / (end - begin) as f64
        })
        .collect()
}

/// Returns the index of maximum curvature of a decreasing convex curve, such as a
/// decaying dB envelope right after an attack.
///
/// Both axes are normalized to `[0, 1]`, the curve is flipped to an increasing
/// concave one, and the knee is where it rises furthest above the diagonal.
/// Returns `None` for flat or too-short curves, or when no point lies above the
/// diagonal.
pub fn locate_knee(y: &[f64], smoothing: usize) -> Option<usize> {
    if y.len() < 3 {
        return None;
    }
    let y = smooth(y, smoothing);

    let (y_min, y_max) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = y_max - y_min;
    if range <= FLAT_TOLERANCE || !range.is_finite() {
        return None;
    }

    let last = (y.len() - 1) as f64;
    let (knee, difference) = y
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let x_norm = i as f64 / last;
            let flipped = (y_max - v) / range;
            (i, flipped - x_norm)
        })
        .fold((0, f64::NEG_INFINITY), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });

    (difference > 0.0).then_some(knee)
}
