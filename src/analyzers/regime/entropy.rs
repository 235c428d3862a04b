// =============================================================================
// Return-Distribution Entropy
// =============================================================================
//
// Shannon entropy of a 10-bin histogram of bar-to-bar returns, base-2,
// normalized by log2(10) so the result lands in [0, 1]:
//
//   0.0  =>  all returns identical (a single occupied bin)
//   1.0  =>  returns spread uniformly across all bins (maximum disorder)
//
// Degenerate inputs (fewer than two closes, zero-width return range) yield
// 0.0 — a flat market is perfectly ordered, not noisy.

use tracing::trace;

/// Histogram bin count. Downstream chaos thresholds were tuned against this
/// exact value; do not re-derive it.
pub const RETURN_BINS: usize = 10;

/// Shannon entropy of the return distribution of `closes` (oldest-first).
pub fn return_entropy(closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0].abs() > f64::EPSILON)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.is_empty() {
        return 0.0;
    }

    let min = returns.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = returns.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span < f64::EPSILON {
        // Every return identical — zero disorder.
        return 0.0;
    }

    let mut bins = [0usize; RETURN_BINS];
    for &r in &returns {
        let idx = (((r - min) / span) * RETURN_BINS as f64) as usize;
        bins[idx.min(RETURN_BINS - 1)] += 1;
    }

    let total = returns.len() as f64;
    let h: f64 = bins
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum();

    let normalized = (h / (RETURN_BINS as f64).log2()).clamp(0.0, 1.0);

    trace!(
        entropy = format!("{:.4}", normalized),
        returns = returns.len(),
        "return-distribution entropy computed"
    );

    normalized
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_has_zero_entropy() {
        let closes = vec![100.0; 150];
        assert!(return_entropy(&closes).abs() < 1e-12);
    }

    #[test]
    fn constant_return_has_zero_entropy() {
        // Exponential growth: every return identical.
        let closes: Vec<f64> = (0..100).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        assert!(return_entropy(&closes).abs() < 1e-12);
    }

    #[test]
    fn too_short_input_is_zero() {
        assert!(return_entropy(&[]).abs() < f64::EPSILON);
        assert!(return_entropy(&[100.0]).abs() < f64::EPSILON);
    }

    #[test]
    fn scattered_returns_have_high_entropy() {
        // Deterministic pseudo-noise spreads returns across many bins.
        let mut state = 88_172_645_463_325_252_u64;
        let mut price = 100.0;
        let closes: Vec<f64> = (0..300)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let r = (state as f64 / u64::MAX as f64) - 0.5;
                price *= 1.0 + r * 0.02;
                price
            })
            .collect();
        let h = return_entropy(&closes);
        assert!(h > 0.5, "noisy returns should score high entropy, got {h:.4}");
    }

    #[test]
    fn two_level_returns_score_between_extremes() {
        // Alternating +1% / -1% returns: exactly two occupied bins.
        let mut price = 100.0;
        let closes: Vec<f64> = (0..200)
            .map(|i| {
                price *= if i % 2 == 0 { 1.01 } else { 0.99 };
                price
            })
            .collect();
        let h = return_entropy(&closes);
        // Two equally likely bins: H = 1 bit / log2(10) ≈ 0.301.
        assert!(
            (h - 1.0 / (RETURN_BINS as f64).log2()).abs() < 0.02,
            "two-level distribution should sit near 0.30, got {h:.4}"
        );
    }

    #[test]
    fn entropy_is_bounded() {
        let closes: Vec<f64> = (0..150)
            .map(|i| 100.0 + 10.0 * ((i as f64) * 0.7).sin())
            .collect();
        let h = return_entropy(&closes);
        assert!((0.0..=1.0).contains(&h));
    }
}
