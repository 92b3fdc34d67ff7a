//! Piecewise-linear interpolation clamped at the ends.

/// Value of the polyline `(xs, ys)` at `x`.
///
/// `xs` must be non-decreasing. Outside `[xs[0], xs[last]]` the nearest
/// endpoint value is returned. At an exact sample position the sample value
/// is returned unchanged. `None` for empty input.
pub fn interp_clamped(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    if xs.is_empty() || xs.len() != ys.len() {
        return None;
    }
    let upper = xs.partition_point(|&v| v <= x);
    Some(segment_value(xs, ys, upper, x))
}

/// Interpolate `(xs, ys)` at every target.
///
/// Sorted targets are resolved with a single forward walk over `xs`;
/// unsorted targets fall back to a binary search each.
pub fn interpolate_onto(xs: &[f64], ys: &[f64], targets: &[f64]) -> Vec<f64> {
    if xs.is_empty() || xs.len() != ys.len() {
        return Vec::new();
    }

    if targets.windows(2).all(|w| w[0] <= w[1]) {
        let mut upper = 0;
        targets
            .iter()
            .map(|&t| {
                while upper < xs.len() && xs[upper] <= t {
                    upper += 1;
                }
                segment_value(xs, ys, upper, t)
            })
            .collect()
    } else {
        targets
            .iter()
            .map(|&t| segment_value(xs, ys, xs.partition_point(|&v| v <= t), t))
            .collect()
    }
}

/// `upper` is the first index with `xs[upper] > x`
#[inline]
fn segment_value(xs: &[f64], ys: &[f64], upper: usize, x: f64) -> f64 {
    if upper == 0 {
        return ys[0];
    }
    if upper == xs.len() {
        return ys[xs.len() - 1];
    }
    let (x0, x1) = (xs[upper - 1], xs[upper]);
    let (y0, y1) = (ys[upper - 1], ys[upper]);
    // x0 <= x < x1, so the span is never zero
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
