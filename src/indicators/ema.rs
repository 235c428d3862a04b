// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Building block for the MACD crossover oscillator.
//
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first value is seeded with the SMA of the first `period` closes.
// =============================================================================

/// Compute the EMA series for `closes` (oldest-first) and look-back `period`.
///
/// Returns an empty `Vec` when `period == 0` or the input is shorter than
/// `period`. Each output element corresponds to a close starting at index
/// `period - 1`. Non-finite intermediate values stop the series.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let sma: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sma);

    let mut prev_ema = sma;
    for &close in &closes[period..] {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        result.push(ema);
        prev_ema = ema;
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_for_bad_inputs() {
        assert!(calculate_ema(&[], 9).is_empty());
        assert!(calculate_ema(&[1.0, 2.0], 9).is_empty());
        assert!(calculate_ema(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn ema_seeds_with_sma() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ema = calculate_ema(&closes, 3);
        assert!((ema[0] - 2.0).abs() < 1e-12);
        assert_eq!(ema.len(), 3);
    }

    #[test]
    fn ema_tracks_constant_series() {
        let closes = vec![50.0; 30];
        for v in calculate_ema(&closes, 9) {
            assert!((v - 50.0).abs() < 1e-10);
        }
    }

    #[test]
    fn ema_lags_behind_a_ramp() {
        let closes: Vec<f64> = (1..=40).map(|x| x as f64).collect();
        let ema = calculate_ema(&closes, 9);
        let last = *ema.last().unwrap();
        // EMA follows the ramp from below.
        assert!(last < 40.0 && last > 30.0, "EMA {last} outside expected band");
    }
}
