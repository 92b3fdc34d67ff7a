//! Angle wrap handling.
//!
//! Phase readings live on a circle; these helpers are the only place that
//! knows about the 360° period.

/// Map any finite angle into `[0, 360)`.
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let r = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// Fold an angular difference onto its minimal alias in `[0, 90]`.
///
/// θ, 180−θ and 360−θ are indistinguishable in the sensing setup, so all of
/// them collapse to the same magnitude: `min(x mod 180, 180 − x mod 180)`.
#[inline]
pub fn fold_to_minimal(angle: f64) -> f64 {
    let m = angle.rem_euclid(180.0);
    let m = if m >= 180.0 { 0.0 } else { m };
    m.min(180.0 - m)
}

/// Remove ±360° jumps from a wrapped sequence.
///
/// The correction grows by one period for every raw step whose magnitude
/// exceeds 180°. Steps are always taken between the raw inputs, never between
/// already corrected values.
pub fn unwrap(sequence: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(sequence.len());
    let mut correction = 0.0;
    let mut prev: Option<f64> = None;

    for &value in sequence {
        if let Some(p) = prev {
            let step = value - p;
            if step > 180.0 {
                correction -= 360.0;
            } else if step < -180.0 {
                correction += 360.0;
            }
        }
        out.push(value + correction);
        prev = Some(value);
    }

    out
}
