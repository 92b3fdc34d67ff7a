//! Dynamic time warping over scalar sequences.
//!
//! Cumulative cost lives in an `(n+1) x (m+1)` `DMatrix` whose first row and
//! column are the infinite boundary. Local cost is `|a[i] - b[j]|`.
//!
//! With a band radius the search is restricted to a Sakoe-Chiba corridor
//! around the scaled diagonal. The corridor trades alignment quality for
//! O((n+m)·r) work; when it is too narrow to connect the endpoints the exact
//! search is run instead, so a result is always produced for non-empty input.

use nalgebra::DMatrix;

/// Warping path and its cumulative cost
#[derive(Debug, Clone, PartialEq)]
pub struct DtwAlignment {
    /// `(i, j)` index pairs from `(0, 0)` to `(n-1, m-1)`
    pub path: Vec<(usize, usize)>,
    pub cost: f64,
}

impl DtwAlignment {
    /// Materialize the aligned sequences
    pub fn apply(&self, a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
        self.path.iter().map(|&(i, j)| (a[i], b[j])).unzip()
    }
}

/// Align `a` and `b`; `None` if either is empty.
pub fn dtw(a: &[f64], b: &[f64], band: Option<usize>) -> Option<DtwAlignment> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    if let Some(radius) = band {
        let acc = accumulate(a, b, Some(radius));
        if acc[(a.len(), b.len())].is_finite() {
            return Some(backtrack(&acc));
        }
    }

    Some(backtrack(&accumulate(a, b, None)))
}

fn accumulate(a: &[f64], b: &[f64], band: Option<usize>) -> DMatrix<f64> {
    let (n, m) = (a.len(), b.len());
    let mut acc = DMatrix::from_element(n + 1, m + 1, f64::INFINITY);
    acc[(0, 0)] = 0.0;

    for i in 1..=n {
        let (lo, hi) = match band {
            Some(radius) => corridor(i, n, m, radius),
            None => (1, m),
        };
        for j in lo..=hi {
            let cost = (a[i - 1] - b[j - 1]).abs();
            let best = acc[(i - 1, j - 1)].min(acc[(i - 1, j)]).min(acc[(i, j - 1)]);
            acc[(i, j)] = cost + best;
        }
    }

    acc
}

/// Column range of row `i` (1-based) inside the band
fn corridor(i: usize, n: usize, m: usize, radius: usize) -> (usize, usize) {
    let center = (i * m).div_ceil(n);
    let lo = center.saturating_sub(radius).max(1);
    let hi = (center + radius).min(m);
    (lo, hi)
}

fn backtrack(acc: &DMatrix<f64>) -> DtwAlignment {
    let (mut i, mut j) = (acc.nrows() - 1, acc.ncols() - 1);
    let cost = acc[(i, j)];
    let mut path = Vec::with_capacity(i + j);

    while i > 0 && j > 0 {
        path.push((i - 1, j - 1));
        let diag = acc[(i - 1, j - 1)];
        let up = acc[(i - 1, j)];
        let left = acc[(i, j - 1)];
        // Ties prefer the diagonal so identical inputs pair one-to-one
        if diag <= up && diag <= left {
            i -= 1;
            j -= 1;
        } else if up <= left {
            i -= 1;
        } else {
            j -= 1;
        }
    }

    path.reverse();
    DtwAlignment { path, cost }
}
