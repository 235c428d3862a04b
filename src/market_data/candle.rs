// =============================================================================
// Candle — immutable OHLCV value type and window helpers
// =============================================================================
//
// A candle window is a plain slice `&[Candle]` ordered MOST-RECENT-FIRST:
// index 0 is the latest bar, index len-1 the oldest. Gap-filling and feed
// hygiene happen upstream; the analyzers only read.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A single OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time in epoch milliseconds.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// True when the bar closed above its open.
    #[inline]
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }

    /// Absolute body size.
    #[inline]
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full high-to-low range.
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Upper wick: distance from the body top to the high.
    #[inline]
    pub fn upper_wick(&self) -> f64 {
        self.high - self.close.max(self.open)
    }

    /// Lower wick: distance from the body bottom to the low.
    #[inline]
    pub fn lower_wick(&self) -> f64 {
        self.close.min(self.open) - self.low
    }
}

/// Closing prices of the `count` most recent candles, oldest-first.
///
/// Indicator code (RSI, EMA, MACD) consumes oldest-first series; this is the
/// bridge from the most-recent-first window convention.
pub fn closes_oldest_first(window: &[Candle], count: usize) -> Vec<f64> {
    let take = count.min(window.len());
    window[..take].iter().rev().map(|c| c.close).collect()
}

/// Mean volume over the `count` most recent candles (0.0 for an empty slice).
pub fn avg_volume(window: &[Candle], count: usize) -> f64 {
    let take = count.min(window.len());
    if take == 0 {
        return 0.0;
    }
    window[..take].iter().map(|c| c.volume).sum::<f64>() / take as f64
}

/// Load a candle window from a JSON file containing an array of candles in
/// most-recent-first order.
pub fn load_window(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read candle file {}", path.display()))?;
    let window: Vec<Candle> =
        serde_json::from_str(&raw).context("failed to parse candle JSON")?;
    Ok(window)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            open_time: 0,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn candle_anatomy() {
        let c = candle(100.0, 110.0, 95.0, 105.0, 1.0);
        assert!(c.is_up());
        assert!((c.body() - 5.0).abs() < 1e-12);
        assert!((c.range() - 15.0).abs() < 1e-12);
        assert!((c.upper_wick() - 5.0).abs() < 1e-12);
        assert!((c.lower_wick() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn closes_reverse_order() {
        // Window is most-recent-first: closes 3, 2, 1.
        let window = vec![
            candle(0.0, 3.0, 3.0, 3.0, 1.0),
            candle(0.0, 2.0, 2.0, 2.0, 1.0),
            candle(0.0, 1.0, 1.0, 1.0, 1.0),
        ];
        assert_eq!(closes_oldest_first(&window, 3), vec![1.0, 2.0, 3.0]);
        assert_eq!(closes_oldest_first(&window, 2), vec![2.0, 3.0]);
    }

    #[test]
    fn avg_volume_handles_short_windows() {
        let window = vec![
            candle(0.0, 1.0, 1.0, 1.0, 10.0),
            candle(0.0, 1.0, 1.0, 1.0, 20.0),
        ];
        assert!((avg_volume(&window, 2) - 15.0).abs() < 1e-12);
        assert!((avg_volume(&window, 100) - 15.0).abs() < 1e-12);
        assert!((avg_volume(&[], 5) - 0.0).abs() < f64::EPSILON);
    }
}
