// =============================================================================
// Chaos Metrics — box-counting dimension and divergence sensitivity
// =============================================================================
//
// Fractal dimension: the series is normalized into the unit square and covered
// with grids of side 1/s for scales s in {2, 4, 8, 16, 32} (scales larger than
// half the series are skipped). The dimension is the OLS slope of
// log(occupied boxes) on log(scale), clamped to [1, 2]. A flat series is a
// smooth line (1.0); fewer than two valid scale points fall back to 1.5.
//
// Sensitivity exponent: Lyapunov-style average log-divergence of adjacent-close
// separations measured again 10 steps later, clamped to [-1, 1]. Positive
// values mean nearby trajectories fly apart — chaotic sensitivity.

use tracing::trace;

use crate::analyzers::regime::hurst::ols_slope;

/// Grid scales for the box count.
const SCALES: [usize; 5] = [2, 4, 8, 16, 32];

/// Returned when the log-log regression cannot be formed.
pub const FRACTAL_FALLBACK: f64 = 1.5;

/// Dimension of a flat (zero-range) series.
pub const FRACTAL_FLAT: f64 = 1.0;

/// Horizon (bars) over which trajectory separations are re-measured.
const SENSITIVITY_HORIZON: usize = 10;

/// Box-counting fractal dimension of `closes` (oldest-first), in [1, 2].
pub fn fractal_dimension(closes: &[f64]) -> f64 {
    let n = closes.len();
    if n < 4 {
        return FRACTAL_FALLBACK;
    }

    let min = closes.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span < f64::EPSILON {
        return FRACTAL_FLAT;
    }

    // Normalize prices into [0, 1].
    let normalized: Vec<f64> = closes.iter().map(|&c| (c - min) / span).collect();

    let mut log_scale: Vec<f64> = Vec::with_capacity(SCALES.len());
    let mut log_count: Vec<f64> = Vec::with_capacity(SCALES.len());

    for &scale in &SCALES {
        if scale > n / 2 {
            continue;
        }

        // Split the time axis into `scale` columns; in each column count the
        // vertical cells of height 1/scale the curve passes through.
        let col_len = n.div_ceil(scale);
        let cell = 1.0 / scale as f64;
        let mut boxes = 0usize;

        for col in normalized.chunks(col_len) {
            let lo = col.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let lo_cell = (lo / cell).floor() as isize;
            let hi_cell = (hi / cell).floor() as isize;
            boxes += (hi_cell - lo_cell + 1).max(1) as usize;
        }

        log_scale.push((scale as f64).ln());
        log_count.push((boxes as f64).ln());
    }

    if log_scale.len() < 2 {
        trace!("fractal: too few valid scales, using fallback");
        return FRACTAL_FALLBACK;
    }

    match ols_slope(&log_scale, &log_count) {
        Some(slope) => slope.clamp(1.0, 2.0),
        None => FRACTAL_FALLBACK,
    }
}

/// Divergence-sensitivity exponent of `closes` (oldest-first), in [-1, 1].
///
/// For each index i the separation of the adjacent pair (i, i+1) is compared
/// with the separation of the pair 10 steps later; the per-step log ratio is
/// averaged over all pairs where both separations are non-zero. No valid pair
/// (e.g. a flat series) yields 0.0 — no measurable sensitivity.
pub fn sensitivity_exponent(closes: &[f64]) -> f64 {
    let n = closes.len();
    if n < SENSITIVITY_HORIZON + 2 {
        return 0.0;
    }

    let mut sum = 0.0_f64;
    let mut valid = 0usize;

    for i in 0..(n - SENSITIVITY_HORIZON - 1) {
        let d0 = (closes[i + 1] - closes[i]).abs();
        let d1 = (closes[i + SENSITIVITY_HORIZON + 1] - closes[i + SENSITIVITY_HORIZON]).abs();
        if d0 < f64::EPSILON || d1 < f64::EPSILON {
            continue;
        }
        sum += (d1 / d0).ln() / SENSITIVITY_HORIZON as f64;
        valid += 1;
    }

    if valid == 0 {
        return 0.0;
    }

    (sum / valid as f64).clamp(-1.0, 1.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_series(len: usize, seed: u64, amplitude: f64) -> Vec<f64> {
        let mut state = seed;
        let mut price = 100.0;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let r = (state as f64 / u64::MAX as f64) - 0.5;
                price += r * amplitude;
                price
            })
            .collect()
    }

    #[test]
    fn flat_series_is_a_line() {
        let closes = vec![100.0; 150];
        assert!((fractal_dimension(&closes) - FRACTAL_FLAT).abs() < 1e-12);
    }

    #[test]
    fn short_series_uses_fallback() {
        assert!((fractal_dimension(&[1.0, 2.0]) - FRACTAL_FALLBACK).abs() < 1e-12);
    }

    #[test]
    fn smooth_ramp_has_low_dimension() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 + i as f64).collect();
        let d = fractal_dimension(&closes);
        assert!(d < 1.4, "a straight ramp should be near dimension 1, got {d:.3}");
    }

    #[test]
    fn noise_has_higher_dimension_than_a_ramp() {
        let ramp: Vec<f64> = (0..200).map(|i| 100.0 + i as f64 * 0.1).collect();
        let noise = noisy_series(200, 0x2545_F491_4F6C_DD1D, 4.0);
        let d_ramp = fractal_dimension(&ramp);
        let d_noise = fractal_dimension(&noise);
        assert!(
            d_noise > d_ramp,
            "noise ({d_noise:.3}) should out-rough the ramp ({d_ramp:.3})"
        );
    }

    #[test]
    fn dimension_is_clamped() {
        let noise = noisy_series(300, 7, 10.0);
        let d = fractal_dimension(&noise);
        assert!((1.0..=2.0).contains(&d), "dimension {d:.3} out of [1, 2]");
    }

    #[test]
    fn flat_series_has_zero_sensitivity() {
        let closes = vec![100.0; 150];
        assert!(sensitivity_exponent(&closes).abs() < f64::EPSILON);
    }

    #[test]
    fn steady_ramp_has_zero_sensitivity() {
        // Constant separations: every log ratio is ln(1) = 0.
        let closes: Vec<f64> = (0..150).map(|i| 100.0 + i as f64).collect();
        assert!(sensitivity_exponent(&closes).abs() < 1e-12);
    }

    #[test]
    fn expanding_swings_have_positive_sensitivity() {
        // Separations grow geometrically along the series.
        let mut price = 100.0;
        let closes: Vec<f64> = (0..120)
            .map(|i| {
                let step = 0.01 * 1.05_f64.powi(i);
                price += if i % 2 == 0 { step } else { -step * 0.5 };
                price
            })
            .collect();
        let lambda = sensitivity_exponent(&closes);
        assert!(lambda > 0.0, "expanding swings should diverge, got {lambda:.4}");
    }

    #[test]
    fn damping_swings_have_negative_sensitivity() {
        let mut price = 100.0;
        let closes: Vec<f64> = (0..120)
            .map(|i| {
                let step = 10.0 * 0.95_f64.powi(i);
                price += if i % 2 == 0 { step } else { -step * 0.5 };
                price
            })
            .collect();
        let lambda = sensitivity_exponent(&closes);
        assert!(lambda < 0.0, "damping swings should converge, got {lambda:.4}");
    }

    #[test]
    fn sensitivity_is_clamped() {
        let noise = noisy_series(200, 99, 50.0);
        let lambda = sensitivity_exponent(&noise);
        assert!((-1.0..=1.0).contains(&lambda));
    }
}
