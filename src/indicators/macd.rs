// =============================================================================
// MACD — trend-following crossover oscillator
// =============================================================================
//
// MACD(12, 26, 9):
//   macd_line = EMA(12) - EMA(26)
//   signal    = EMA(9) of the macd line
//   histogram = macd_line - signal
//
// The momentum engine classifies crossover state from the sign and magnitude
// of the histogram; magnitude is best read in basis points of the latest
// close so thresholds are price-scale independent.

use serde::{Deserialize, Serialize};

use crate::indicators::ema::calculate_ema;

/// Fast EMA period.
pub const MACD_FAST: usize = 12;

/// Slow EMA period.
pub const MACD_SLOW: usize = 26;

/// Signal-line EMA period.
pub const MACD_SIGNAL: usize = 9;

/// Most recent MACD snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacdResult {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
    /// Histogram of the bar before the latest, for slope checks.
    pub prev_histogram: f64,
}

impl MacdResult {
    /// Histogram expressed in basis points of `price` (0.0 when `price` is 0).
    pub fn histogram_bps(&self, price: f64) -> f64 {
        if price.abs() < f64::EPSILON {
            return 0.0;
        }
        self.histogram / price * 10_000.0
    }
}

/// Compute the latest MACD snapshot from `closes` (oldest-first).
///
/// Returns `None` when there is not enough history for the slow EMA plus the
/// signal line (`MACD_SLOW + MACD_SIGNAL` closes).
pub fn calculate_macd(closes: &[f64]) -> Option<MacdResult> {
    if closes.len() < MACD_SLOW + MACD_SIGNAL {
        return None;
    }

    let fast = calculate_ema(closes, MACD_FAST);
    let slow = calculate_ema(closes, MACD_SLOW);
    if fast.is_empty() || slow.is_empty() {
        return None;
    }

    // Align the two series on their tails: both end at the latest close.
    let len = fast.len().min(slow.len());
    let fast_tail = &fast[fast.len() - len..];
    let slow_tail = &slow[slow.len() - len..];

    let macd_series: Vec<f64> = fast_tail
        .iter()
        .zip(slow_tail)
        .map(|(f, s)| f - s)
        .collect();

    let signal_series = calculate_ema(&macd_series, MACD_SIGNAL);
    if signal_series.len() < 2 {
        return None;
    }

    let sig_len = signal_series.len();
    let macd_tail = &macd_series[macd_series.len() - sig_len..];

    let macd_line = *macd_tail.last()?;
    let signal_line = *signal_series.last()?;
    let histogram = macd_line - signal_line;
    let prev_histogram = macd_tail[sig_len - 2] - signal_series[sig_len - 2];

    if !histogram.is_finite() || !prev_histogram.is_finite() {
        return None;
    }

    Some(MacdResult {
        macd_line,
        signal_line,
        histogram,
        prev_histogram,
    })
}
