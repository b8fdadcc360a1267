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

//! Fractional-position reads and integer-factor upsampling.

use crate::config::Interpolation;

/// A natural cubic spline through uniformly spaced knots at `0, 1, ..., n - 1`.
#[derive(Debug, Clone)]
pub struct CubicSpline<'a> {
    y: &'a [f64],
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl<'a> CubicSpline<'a> {
    /// Fits a natural spline (zero curvature at both ends).
    pub fn natural(y: &'a [f64]) -> Self {
        let n = y.len();
        let mut m = vec![0.0; n];
        if n < 3 {
            return Self { y, m };
        }

        // Tridiagonal system m[i-1] + 4 m[i] + m[i+1] = 6 (y[i+1] - 2 y[i] + y[i-1])
        // over the interior knots, solved with the Thomas algorithm.
        let interior = n - 2;
        let mut c = vec![0.0; interior];
        let mut d = vec![0.0; interior];
        for k in 0..interior {
            let i = k + 1;
            let rhs = 6.0 * (y[i + 1] - 2.0 * y[i] + y[i - 1]);
            if k == 0 {
                c[k] = 1.0 / 4.0;
                d[k] = rhs / 4.0;
            } else {
                let denom = 4.0 - c[k - 1];
                c[k] = 1.0 / denom;
                d[k] = (rhs - d[k - 1]) / denom;
            }
        }
        m[interior] = d[interior - 1];
        for k in (0..interior - 1).rev() {
            m[k + 1] = d[k] - c[k] * m[k + 2];
        }

        Self { y, m }
    }

    /// Evaluates the spline at `t`. Positions outside the knots extend the end segments.
    pub fn eval(&self, t: f64) -> f64 {
        let n = self.y.len();
        match n {
            0 => 0.0,
            1 => self.y[0],
            _ => {
                let i = (t.floor().max(0.0) as usize).min(n - 2);
                let b = t - i as f64;
                let a = 1.0 - b;
                a * self.y[i]
                    + b * self.y[i + 1]
                    + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) / 6.0
            }
        }
    }
}

/// Linear read at position `t`, extending the end segments outside the knots.
pub fn linear_at(y: &[f64], t: f64) -> f64 {
    let n = y.len();
    match n {
        0 => 0.0,
        1 => y[0],
        _ => {
            let i = (t.floor().max(0.0) as usize).min(n - 2);
            let f = t - i as f64;
            y[i] + (y[i + 1] - y[i]) * f
        }
    }
}

/// Fractional-position reader over a slice using the configured interpolator.
#[derive(Debug, Clone)]
pub enum Reader<'a> {
    Linear(&'a [f64]),
    Cubic(CubicSpline<'a>),
}

impl<'a> Reader<'a> {
    pub fn new(y: &'a [f64], kind: Interpolation) -> Self {
        match kind {
            Interpolation::Linear => Reader::Linear(y),
            Interpolation::Cubic => Reader::Cubic(CubicSpline::natural(y)),
        }
    }

    pub fn at(&self, t: f64) -> f64 {
        match self {
            Reader::Linear(y) => linear_at(y, t),
            Reader::Cubic(spline) => spline.eval(t),
        }
    }
}

/// Upsamples by zero insertion followed by interpolation of the inserted positions.
///
/// Original samples land on every `factor`-th output position unchanged. The trailing
/// `factor - 1` positions, which would need extrapolation, are each set to the mean of
/// the `factor` values before them.
pub fn upsample(a: &[f64], factor: usize, kind: Interpolation) -> Vec<f64> {
    if factor < 2 || a.len() < 2 {
        return a.to_vec();
    }

    let len = a.len() * factor;
    let mut z = vec![0.0; len];
    let interior = (a.len() - 1) * factor;
    let reader = Reader::new(a, kind);
    for (j, value) in z.iter_mut().enumerate().take(interior + 1) {
        *value = if j % factor == 0 {
            a[j / factor]
        } else {
            reader.at(j as f64 / factor as f64)
        };
    }

    let k = len - factor + 1;
    for i in 0..factor - 1 {
        let window = &z[k + i - factor..k + i];
        z[k + i] = window.iter().sum::<f64>() / factor as f64;
    }

    z
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_spline_passes_through_knots() {
        let y = [0.0, 1.0, 4.0, 9.0, 16.0, 25.0];
        let spline = CubicSpline::natural(&y);
        for (i, v) in y.iter().enumerate() {
            assert!((spline.eval(i as f64) - v).abs() < 1e-12);
        }
    }

    #[test]
    fn test_spline_reproduces_lines() {
        let y: Vec<f64> = (0..10).map(|i| 3.0 * i as f64 - 2.0).collect();
        let spline = CubicSpline::natural(&y);
        for t in [0.25, 3.5, 7.75, 8.9] {
            assert!((spline.eval(t) - (3.0 * t - 2.0)).abs() < 1e-9);
        }
        // Extends the end segments.
        assert!((spline.eval(9.5) - (3.0 * 9.5 - 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_spline_tracks_sine() {
        let period = 40.0;
        let y: Vec<f64> = (0..200)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / period).sin())
            .collect();
        let spline = CubicSpline::natural(&y);
        for t in [50.5, 100.25, 120.75] {
            let expected = (2.0 * std::f64::consts::PI * t / period).sin();
            assert!((spline.eval(t) - expected).abs() < 1e-4);
            assert!((linear_at(&y, t) - expected).abs() < 5e-3);
        }
    }

    #[test]
    fn test_reader_kinds() {
        let knots = [0.0, 2.0, 4.0];
        let linear = Reader::new(&knots, Interpolation::Linear);
        assert_eq!(1.0, linear.at(0.5));
        assert_eq!(3.0, linear.at(1.5));
        let cubic = Reader::new(&knots, Interpolation::Cubic);
        assert!((cubic.at(0.5) - 1.0).abs() < 1e-12);
        assert!((cubic.at(1.5) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_upsample_keeps_originals() {
        let a = [0.0, 1.0, 0.0, -1.0, 0.0, 1.0];
        for kind in [Interpolation::Linear, Interpolation::Cubic] {
            let z = upsample(&a, 3, kind);
            assert_eq!(18, z.len());
            for (i, v) in a.iter().enumerate() {
                assert_eq!(*v, z[i * 3]);
            }
        }

        let z = upsample(&a, 2, Interpolation::Linear);
        assert_eq!(0.5, z[1]);
        assert_eq!(-0.5, z[7]);
        // The final position averages the two before it.
        assert_eq!((z[9] + z[10]) / 2.0, z[11]);
    }

    #[test]
    fn test_upsample_factor_one_is_identity() {
        let a = [0.25, -0.5, 0.75];
        assert_eq!(a.to_vec(), upsample(&a, 1, Interpolation::Cubic));
    }
}
