// =============================================================================
// Oscillator — 14-period RSI with Wilder's smoothing
// =============================================================================
//
// The momentum/divergence engine reads price strength through a bounded
// oscillator in [0, 100]. Construction:
//
//   1. Price deltas from consecutive closes.
//   2. Seed average gain / average loss with the SMA of the first `period`
//      gains / losses.
//   3. Wilder smoothing:
//        avg_gain = (prev_avg_gain * (period - 1) + gain) / period
//        avg_loss = (prev_avg_loss * (period - 1) + loss) / period
//   4. RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//
// Degenerate rules (must never propagate NaN/∞ downstream):
//   - no movement at all   => 50.0 (neutral)
//   - no down moves at all => 100.0
// =============================================================================

/// Standard look-back used by the momentum engine.
pub const OSCILLATOR_PERIOD: usize = 14;

/// Oscillator level above which the market is considered overextended up.
pub const OVERBOUGHT: f64 = 80.0;

/// Oscillator level below which the market is considered overextended down.
pub const OVERSOLD: f64 = 20.0;

/// Compute the oscillator series for `closes` (oldest-first) and `period`.
///
/// One output value per close starting at index `period` — the first `period`
/// closes seed the averages. Empty when `period == 0` or the input is shorter
/// than `period + 1` closes.
pub fn oscillator_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (sum_gain, sum_loss) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l + d.abs())
            }
        });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    match level_from_averages(avg_gain, avg_loss) {
        Some(v) => result.push(v),
        None => return Vec::new(),
    }

    for &delta in &deltas[period..] {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match level_from_averages(avg_gain, avg_loss) {
            Some(v) => result.push(v),
            // Non-finite — stop producing values rather than poison the series.
            None => break,
        }
    }

    result
}

/// Most recent oscillator value, or `None` when history is too short.
pub fn oscillator_current(closes: &[f64], period: usize) -> Option<f64> {
    oscillator_series(closes, period).last().copied()
}

/// Convert smoothed averages into a [0, 100] level with the degenerate rules.
fn level_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let level = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // Flat series — neutral.
    } else if avg_loss == 0.0 {
        100.0 // Only gains.
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    level.is_finite().then_some(level)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_short_inputs() {
        assert!(oscillator_series(&[], 14).is_empty());
        assert!(oscillator_series(&[1.0, 2.0, 3.0], 0).is_empty());
        // 14 closes => 13 deltas < period.
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(oscillator_series(&closes, 14).is_empty());
    }

    #[test]
    fn monotone_up_pegs_at_100() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        for v in oscillator_series(&closes, 14) {
            assert!((v - 100.0).abs() < 1e-10, "expected 100.0, got {v}");
        }
    }

    #[test]
    fn monotone_down_pegs_at_0() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        for v in oscillator_series(&closes, 14) {
            assert!(v.abs() < 1e-10, "expected 0.0, got {v}");
        }
    }

    #[test]
    fn flat_series_is_neutral() {
        let closes = vec![100.0; 30];
        for v in oscillator_series(&closes, 14) {
            assert!((v - 50.0).abs() < 1e-10, "expected 50.0, got {v}");
        }
    }

    #[test]
    fn values_stay_in_range() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89,
            46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        for v in oscillator_series(&closes, 14) {
            assert!((0.0..=100.0).contains(&v), "oscillator {v} out of range");
        }
    }

    #[test]
    fn current_matches_series_tail() {
        let closes: Vec<f64> = (0..40).map(|x| 100.0 + (x as f64 * 0.7).sin()).collect();
        let series = oscillator_series(&closes, 14);
        assert_eq!(oscillator_current(&closes, 14), series.last().copied());
    }
}
