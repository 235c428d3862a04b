// =============================================================================
// State-Probability Analyzer — three-way market-state distribution
// =============================================================================
//
// Estimates P(bullish) / P(bearish) / P(neutral) from four weighted
// components of the candle window:
//
//   1. Fraction of up-candles over the last 20 bars      (weight 0.30)
//   2. Net price change over the whole window, x10 capped (weight 0.30)
//   3. Short-window momentum over 10 bars, x10 capped     (weight 0.20)
//   4. Higher-high / higher-low swing pairs, 10-bar steps (weight 0.20)
//
// The bullish and bearish scores are each capped at 0.95; the neutral mass is
// the floored remainder and the triple is renormalized so it always sums to
// one. Fully deterministic — no randomness, no wall clock.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{EngineError, Stage};
use crate::market_data::Candle;

/// Minimum window length for this analyzer.
pub const MIN_CANDLES: usize = 50;

/// Bars inspected for the up-candle fraction component.
const COMPOSITION_BARS: usize = 20;

/// Bars inspected for the short-window momentum component.
const MOMENTUM_BARS: usize = 10;

/// Swing samples are taken every this many bars.
const SWING_STEP: usize = 10;

/// Component weights (sum to 1.0).
const W_COMPOSITION: f64 = 0.30;
const W_NET_CHANGE: f64 = 0.30;
const W_MOMENTUM: f64 = 0.20;
const W_SWINGS: f64 = 0.20;

/// Relative price changes are scaled by this factor before capping.
const CHANGE_SCALE: f64 = 10.0;

/// Hard cap on either directional score.
const SCORE_CAP: f64 = 0.95;

/// Dominant market state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketState {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for MarketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Snapshot of the three-way state distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateProbability {
    pub p_bullish: f64,
    pub p_bearish: f64,
    pub p_neutral: f64,
    /// Argmax of the three probabilities (bullish wins exact ties over
    /// bearish, bearish over neutral, keeping repeated runs bit-identical).
    pub dominant: MarketState,
    /// Spread between the largest and smallest probability.
    pub strength: f64,
    /// Normalized Shannon entropy of the distribution (base-3 log), in [0, 1].
    pub entropy: f64,
}

impl StateProbability {
    /// Probability of the dominant state — the aggregator's Bayesian prior.
    pub fn dominant_probability(&self) -> f64 {
        match self.dominant {
            MarketState::Bullish => self.p_bullish,
            MarketState::Bearish => self.p_bearish,
            MarketState::Neutral => self.p_neutral,
        }
    }
}

/// Analyze the candle window (most-recent-first) into a state distribution.
pub fn analyze(window: &[Candle]) -> Result<StateProbability, EngineError> {
    if window.len() < MIN_CANDLES {
        return Err(EngineError::insufficient(
            Stage::StateProbability,
            MIN_CANDLES,
            window.len(),
        ));
    }

    let mut bullish = 0.0_f64;
    let mut bearish = 0.0_f64;

    // --- 1. Candle composition over the last 20 bars -------------------------
    let recent = &window[..COMPOSITION_BARS];
    let up_fraction =
        recent.iter().filter(|c| c.is_up()).count() as f64 / COMPOSITION_BARS as f64;
    bullish += W_COMPOSITION * up_fraction;
    bearish += W_COMPOSITION * (1.0 - up_fraction);

    // --- 2. Net change over the whole window ---------------------------------
    let oldest = window[window.len() - 1].close;
    let latest = window[0].close;
    let net_change = relative_change(latest, oldest);
    let net_mag = (net_change.abs() * CHANGE_SCALE).min(1.0);
    if net_change > 0.0 {
        bullish += W_NET_CHANGE * net_mag;
    } else if net_change < 0.0 {
        bearish += W_NET_CHANGE * net_mag;
    }

    // --- 3. Short-window momentum (10 bars) ----------------------------------
    let momentum = relative_change(latest, window[MOMENTUM_BARS - 1].close);
    let mom_mag = (momentum.abs() * CHANGE_SCALE).min(1.0);
    if momentum > 0.0 {
        bullish += W_MOMENTUM * mom_mag;
    } else if momentum < 0.0 {
        bearish += W_MOMENTUM * mom_mag;
    }

    // --- 4. Swing structure: samples every 10 bars ---------------------------
    let samples: Vec<&Candle> = window.iter().step_by(SWING_STEP).collect();
    let mut higher_pairs = 0usize;
    let mut lower_pairs = 0usize;
    // samples[i] is more recent than samples[i + 1].
    for pair in samples.windows(2) {
        let (recent, older) = (pair[0], pair[1]);
        if recent.high > older.high && recent.low > older.low {
            higher_pairs += 1;
        } else if recent.high < older.high && recent.low < older.low {
            lower_pairs += 1;
        }
    }
    let total_pairs = samples.len().saturating_sub(1).max(1) as f64;
    bullish += W_SWINGS * higher_pairs as f64 / total_pairs;
    bearish += W_SWINGS * lower_pairs as f64 / total_pairs;

    // --- Assemble the distribution -------------------------------------------
    bullish = bullish.min(SCORE_CAP);
    bearish = bearish.min(SCORE_CAP);
    let neutral = (1.0 - bullish - bearish).max(0.0);

    // Renormalize so the triple sums to exactly one.
    let total = bullish + bearish + neutral;
    let (p_bullish, p_bearish, p_neutral) = if total > 0.0 {
        (bullish / total, bearish / total, neutral / total)
    } else {
        (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
    };

    let dominant = if p_bullish >= p_bearish && p_bullish >= p_neutral {
        MarketState::Bullish
    } else if p_bearish >= p_neutral {
        MarketState::Bearish
    } else {
        MarketState::Neutral
    };

    let max = p_bullish.max(p_bearish).max(p_neutral);
    let min = p_bullish.min(p_bearish).min(p_neutral);
    let strength = max - min;

    let entropy = ternary_entropy(p_bullish, p_bearish, p_neutral);

    trace!(
        p_bullish = format!("{:.4}", p_bullish),
        p_bearish = format!("{:.4}", p_bearish),
        p_neutral = format!("{:.4}", p_neutral),
        dominant = %dominant,
        "state probabilities computed"
    );

    Ok(StateProbability {
        p_bullish,
        p_bearish,
        p_neutral,
        dominant,
        strength,
        entropy,
    })
}

/// (a - b) / b with a zero-denominator guard.
#[inline]
fn relative_change(a: f64, b: f64) -> f64 {
    if b.abs() < f64::EPSILON {
        0.0
    } else {
        (a - b) / b
    }
}

/// Normalized Shannon entropy of a three-way distribution (0 * ln 0 := 0).
fn ternary_entropy(p1: f64, p2: f64, p3: f64) -> f64 {
    let h: f64 = [p1, p2, p3]
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum();
    (h / 3.0_f64.ln()).clamp(0.0, 1.0)
}
