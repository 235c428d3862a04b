// =============================================================================
// Order-Flow Tracker — institutional participation from candle volume
// =============================================================================
//
// Four estimates, all read off the candle window:
//
//   - Volume delta: up-candle volume minus down-candle volume, last 20 bars,
//     reported in millions.
//   - Imbalance: buy pressure / sell pressure, where each side is the candle
//     body plus the wick on that side's favorable end, volume-weighted. A
//     zero sell side maps to the sentinel 10.0 instead of dividing by zero.
//   - Whales: candles whose volume exceeds 3x the 50-bar average, classified
//     bullish/bearish by close vs open.
//   - Accumulation/Distribution: money-flow-multiplier times volume, last 20
//     bars, in millions (zero-range candles are skipped).
//
// Direction is a majority vote across three graded signals (delta, imbalance,
// A/D), each against its own threshold; ties resolve to neutral.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{EngineError, Stage};
use crate::market_data::{avg_volume, Candle};

/// Minimum window length for this analyzer.
pub const MIN_CANDLES: usize = 50;

/// Bars for the volume-delta, imbalance, and A/D sums.
const FLOW_BARS: usize = 20;

/// Bars for the whale-threshold volume average.
const WHALE_BARS: usize = 50;

/// A candle is a whale when its volume exceeds the average by this factor.
const WHALE_VOLUME_FACTOR: f64 = 3.0;

/// Imbalance reported when sell pressure is zero.
const IMBALANCE_SENTINEL: f64 = 10.0;

/// Vote thresholds (delta and A/D are in millions of volume units).
const DELTA_THRESHOLD: f64 = 0.5;
const IMBALANCE_BUY_THRESHOLD: f64 = 1.2;
const IMBALANCE_SELL_THRESHOLD: f64 = 0.8;
const AD_THRESHOLD: f64 = 0.5;

/// Normalizing caps for strength/confidence magnitudes.
const DELTA_CAP: f64 = 2.0;
const IMBALANCE_DEVIATION_CAP: f64 = 2.0;
const AD_CAP: f64 = 2.0;

/// Signal weights in the strength blend.
const W_DELTA: f64 = 0.4;
const W_IMBALANCE: f64 = 0.3;
const W_AD: f64 = 0.3;

/// Confidence blend weights.
const W_CONF_STRENGTH: f64 = 0.5;
const W_CONF_WHALES: f64 = 0.3;
const W_CONF_AGREEMENT: f64 = 0.2;

/// Whale count that saturates the confidence contribution.
const WHALE_COUNT_CAP: f64 = 5.0;

/// Dominant side of the order flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowDirection {
    Buying,
    Selling,
    Neutral,
}

impl std::fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buying => write!(f, "BUYING"),
            Self::Selling => write!(f, "SELLING"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Snapshot of the order-flow estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFlow {
    /// Up-volume minus down-volume over the last 20 bars, in millions.
    pub volume_delta: f64,
    /// Buy/sell pressure ratio (>= 0; 10.0 sentinel when sell side is zero).
    pub imbalance: f64,
    pub whale_count: usize,
    pub bullish_whales: usize,
    pub bearish_whales: usize,
    /// A/D line contribution over the last 20 bars, in millions.
    pub accumulation_distribution: f64,
    pub direction: FlowDirection,
    pub strength: f64,
    pub confidence: f64,
}

/// Analyze the candle window (most-recent-first) for order flow.
pub fn analyze(window: &[Candle]) -> Result<OrderFlow, EngineError> {
    if window.len() < MIN_CANDLES {
        return Err(EngineError::insufficient(
            Stage::OrderFlow,
            MIN_CANDLES,
            window.len(),
        ));
    }

    let flow_span = &window[..FLOW_BARS];

    // --- Volume delta ---------------------------------------------------------
    let up_volume: f64 = flow_span.iter().filter(|c| c.is_up()).map(|c| c.volume).sum();
    let down_volume: f64 = flow_span
        .iter()
        .filter(|c| !c.is_up())
        .map(|c| c.volume)
        .sum();
    let volume_delta = (up_volume - down_volume) / 1e6;

    // --- Imbalance: body plus favorable wick, volume-weighted -----------------
    let mut buy_pressure = 0.0_f64;
    let mut sell_pressure = 0.0_f64;
    for c in flow_span {
        if c.is_up() {
            buy_pressure += (c.body() + c.lower_wick()) * c.volume;
            sell_pressure += c.upper_wick() * c.volume;
        } else {
            sell_pressure += (c.body() + c.upper_wick()) * c.volume;
            buy_pressure += c.lower_wick() * c.volume;
        }
    }
    let imbalance = if sell_pressure < f64::EPSILON {
        if buy_pressure < f64::EPSILON {
            1.0 // No pressure on either side — balanced.
        } else {
            IMBALANCE_SENTINEL
        }
    } else {
        buy_pressure / sell_pressure
    };

    // --- Whale detection over the last 50 bars --------------------------------
    let whale_span = &window[..WHALE_BARS];
    let whale_threshold = avg_volume(window, WHALE_BARS) * WHALE_VOLUME_FACTOR;
    let mut bullish_whales = 0usize;
    let mut bearish_whales = 0usize;
    if whale_threshold > f64::EPSILON {
        for c in whale_span {
            if c.volume > whale_threshold {
                if c.is_up() {
                    bullish_whales += 1;
                } else {
                    bearish_whales += 1;
                }
            }
        }
    }
    let whale_count = bullish_whales + bearish_whales;

    // --- Accumulation/Distribution --------------------------------------------
    let mut ad = 0.0_f64;
    for c in flow_span {
        let range = c.range();
        if range < f64::EPSILON {
            continue; // Zero-range candle carries no positional information.
        }
        let multiplier = ((c.close - c.low) - (c.high - c.close)) / range;
        ad += multiplier * c.volume;
    }
    let accumulation_distribution = ad / 1e6;

    // --- Majority vote across the three graded signals ------------------------
    let delta_vote = graded_vote(volume_delta, DELTA_THRESHOLD, -DELTA_THRESHOLD);
    let imbalance_vote = graded_vote(
        imbalance,
        IMBALANCE_BUY_THRESHOLD,
        IMBALANCE_SELL_THRESHOLD,
    );
    let ad_vote = graded_vote(accumulation_distribution, AD_THRESHOLD, -AD_THRESHOLD);

    let votes = [delta_vote, imbalance_vote, ad_vote];
    let buy_votes = votes.iter().filter(|&&v| v > 0).count();
    let sell_votes = votes.iter().filter(|&&v| v < 0).count();
    let direction = if buy_votes > sell_votes {
        FlowDirection::Buying
    } else if sell_votes > buy_votes {
        FlowDirection::Selling
    } else {
        FlowDirection::Neutral
    };

    // --- Strength: weighted signal magnitudes against their caps --------------
    let delta_mag = (volume_delta.abs() / DELTA_CAP).min(1.0);
    let imbalance_mag = ((imbalance - 1.0).abs() / IMBALANCE_DEVIATION_CAP).min(1.0);
    let ad_mag = (accumulation_distribution.abs() / AD_CAP).min(1.0);
    let strength =
        (W_DELTA * delta_mag + W_IMBALANCE * imbalance_mag + W_AD * ad_mag).clamp(0.0, 1.0);

    // --- Confidence: strength plus whale presence plus vote agreement ---------
    let whale_factor = (whale_count as f64 / WHALE_COUNT_CAP).min(1.0);
    let agreeing = votes.iter().filter(|&&v| v != 0).count() as f64 / votes.len() as f64;
    let confidence = (W_CONF_STRENGTH * strength
        + W_CONF_WHALES * whale_factor
        + W_CONF_AGREEMENT * agreeing)
        .clamp(0.0, 1.0);

    trace!(
        delta_m = format!("{:.4}", volume_delta),
        imbalance = format!("{:.3}", imbalance),
        whales = whale_count,
        ad_m = format!("{:.4}", accumulation_distribution),
        direction = %direction,
        "order flow computed"
    );

    Ok(OrderFlow {
        volume_delta,
        imbalance,
        whale_count,
        bullish_whales,
        bearish_whales,
        accumulation_distribution,
        direction,
        strength,
        confidence,
    })
}

/// +1 above `buy_at`, -1 below `sell_at`, 0 in between.
#[inline]
fn graded_vote(value: f64, buy_at: f64, sell_at: f64) -> i8 {
    if value > buy_at {
        1
    } else if value < sell_at {
        -1
    } else {
        0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Up candle with a strong body and a small favorable wick.
    fn up_candle(volume: f64) -> Candle {
        Candle {
            open_time: 0,
            open: 100.0,
            high: 102.1,
            low: 99.5,
            close: 102.0,
            volume,
        }
    }

    fn down_candle(volume: f64) -> Candle {
        Candle {
            open_time: 0,
            open: 102.0,
            high: 102.5,
            low: 99.9,
            close: 100.0,
            volume,
        }
    }

    fn flat_candle(volume: f64) -> Candle {
        Candle {
            open_time: 0,
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume,
        }
    }

    #[test]
    fn insufficient_data_is_rejected() {
        let window: Vec<Candle> = (0..49).map(|_| up_candle(10.0)).collect();
        assert!(matches!(
            analyze(&window),
            Err(EngineError::InsufficientData { required: 50, .. })
        ));
    }

    #[test]
    fn heavy_buying_is_detected() {
        // All up candles with meaningful volume: delta positive, imbalance
        // above the buy threshold, A/D positive.
        let window: Vec<Candle> = (0..80).map(|_| up_candle(100_000.0)).collect();
        let flow = analyze(&window).unwrap();
        assert_eq!(flow.direction, FlowDirection::Buying);
        assert!(flow.volume_delta > 0.0);
        assert!(flow.imbalance > IMBALANCE_BUY_THRESHOLD);
        assert!(flow.accumulation_distribution > 0.0);
    }

    #[test]
    fn heavy_selling_is_detected() {
        let window: Vec<Candle> = (0..80).map(|_| down_candle(100_000.0)).collect();
        let flow = analyze(&window).unwrap();
        assert_eq!(flow.direction, FlowDirection::Selling);
        assert!(flow.volume_delta < 0.0);
        assert!(flow.imbalance < IMBALANCE_SELL_THRESHOLD);
    }

    #[test]
    fn flat_market_is_neutral() {
        let window: Vec<Candle> = (0..80).map(|_| flat_candle(1_000.0)).collect();
        let flow = analyze(&window).unwrap();
        assert_eq!(flow.direction, FlowDirection::Neutral);
        // Balanced sentinel, not a divide-by-zero artefact.
        assert!((flow.imbalance - 1.0).abs() < 1e-12);
        assert!(flow.accumulation_distribution.abs() < 1e-12);
        assert_eq!(flow.whale_count, 0);
    }

    #[test]
    fn zero_sell_pressure_uses_sentinel() {
        // Up candles with no upper wick at all: sell pressure is exactly zero.
        let mut window: Vec<Candle> = (0..80)
            .map(|_| Candle {
                open_time: 0,
                open: 100.0,
                high: 102.0,
                low: 100.0,
                close: 102.0,
                volume: 10.0,
            })
            .collect();
        // Keep volume below any whale threshold distortion.
        window.iter_mut().for_each(|c| c.volume = 10.0);
        let flow = analyze(&window).unwrap();
        assert!((flow.imbalance - IMBALANCE_SENTINEL).abs() < 1e-12);
    }

    #[test]
    fn whales_are_counted_and_classified() {
        let mut window: Vec<Candle> = (0..80).map(|_| up_candle(10.0)).collect();
        // Two bullish monsters and one bearish in the last 50 bars.
        window[3] = up_candle(500.0);
        window[7] = up_candle(400.0);
        window[11] = down_candle(450.0);
        let flow = analyze(&window).unwrap();
        assert_eq!(flow.whale_count, 3);
        assert_eq!(flow.bullish_whales, 2);
        assert_eq!(flow.bearish_whales, 1);
    }

    #[test]
    fn mixed_signals_tie_to_neutral() {
        // Alternating up/down with equal volume: delta ~0, imbalance near 1,
        // A/D near 0 — all three votes are 0.
        let window: Vec<Candle> = (0..80)
            .map(|i| {
                if i % 2 == 0 {
                    up_candle(1_000.0)
                } else {
                    down_candle(1_000.0)
                }
            })
            .collect();
        let flow = analyze(&window).unwrap();
        assert_eq!(flow.direction, FlowDirection::Neutral);
    }

    #[test]
    fn strength_and_confidence_are_clamped() {
        let window: Vec<Candle> = (0..80).map(|_| up_candle(10_000_000.0)).collect();
        let flow = analyze(&window).unwrap();
        assert!((0.0..=1.0).contains(&flow.strength));
        assert!((0.0..=1.0).contains(&flow.confidence));
        assert!(flow.imbalance >= 0.0);
    }

    #[test]
    fn deterministic_across_runs() {
        let window: Vec<Candle> = (0..80)
            .map(|i| {
                if i % 3 == 0 {
                    down_candle(500.0 + i as f64)
                } else {
                    up_candle(300.0 + i as f64)
                }
            })
            .collect();
        let a = analyze(&window).unwrap();
        let b = analyze(&window).unwrap();
        assert_eq!(a.strength.to_bits(), b.strength.to_bits());
        assert_eq!(a.confidence.to_bits(), b.confidence.to_bits());
    }
}
