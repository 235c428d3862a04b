// =============================================================================
// Momentum/Divergence Engine — inflection, divergence, exhaustion
// =============================================================================
//
// Reads the market through a bounded 14-period oscillator and a MACD
// crossover, then looks for the classic reversal structure:
//
//   - Inflection: crossover state graded from the sign and magnitude of the
//     MACD histogram (in basis points of the latest close).
//   - Regular divergence: price and oscillator pivots disagreeing (higher
//     price high on a lower oscillator high => bearish, mirrored for lows).
//   - Hidden divergence: the reversed comparison — continuation semantics.
//   - Exhaustion: at least two of {oscillator extreme, range contraction,
//     volume contraction, reversal candle pattern}.
//
// One implementation serves all history lengths: when the aligned oscillator
// history is too short for pivot pairing, an explicit simplified fallback
// compares the recent price trend against the oscillator level instead.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{EngineError, Stage};
use crate::indicators::macd::calculate_macd;
use crate::indicators::rsi::{oscillator_series, OSCILLATOR_PERIOD, OVERBOUGHT, OVERSOLD};
use crate::market_data::{closes_oldest_first, Candle};

/// Minimum window length for this analyzer (divergence needs 20 bars).
pub const MIN_CANDLES: usize = 20;

/// Exhaustion detection needs this many bars.
const MIN_EXHAUSTION_CANDLES: usize = 10;

/// Oscillator history is computed over at most this many bars.
const HISTORY_BARS: usize = 50;

/// Extra closes fed to the oscillator so its warm-up does not eat history.
const OSCILLATOR_WARMUP: usize = OSCILLATOR_PERIOD;

/// Pivot detection looks this many bars to each side (5-bar window).
const PIVOT_WING: usize = 2;

/// Minimum aligned history points for pivot-based divergence; below this the
/// simplified fallback heuristic is used.
const MIN_PIVOT_HISTORY: usize = 10;

/// MACD-histogram magnitude (basis points of price) separating a full
/// crossover from the early band.
const EARLY_BAND_BPS: f64 = 5.0;

/// Fallback-heuristic oscillator bands.
const FALLBACK_WEAK_OSC: f64 = 45.0;
const FALLBACK_STRONG_OSC: f64 = 55.0;

/// Exhaustion thresholds.
const RANGE_CONTRACTION_RATIO: f64 = 0.7;
const VOLUME_CONTRACTION_RATIO: f64 = 0.8;
const DOJI_BODY_FRACTION: f64 = 0.1;
const LONG_WICK_RATIO: f64 = 2.5;
const ENGULFING_BODY_RATIO: f64 = 1.5;
const EXHAUSTION_SIGNALS_REQUIRED: usize = 2;

/// Direction-vote weights.
const VOTE_CROSSOVER: i32 = 3;
const VOTE_EARLY_CROSSOVER: i32 = 1;
const VOTE_DIVERGENCE: i32 = 2;
const VOTE_HIDDEN: i32 = 2;
const VOTE_EXHAUSTION_FLIP: i32 = 2;
const VOTE_VOLUME_PENALTY: i32 = 2;

/// Margin one side must win by to leave neutral.
const VOTE_MARGIN: i32 = 2;

/// Strength bonuses on top of the base 50.
const STRENGTH_BASE: f64 = 50.0;
const BONUS_CROSSOVER: f64 = 15.0;
const BONUS_EARLY: f64 = 5.0;
const BONUS_DIVERGENCE: f64 = 15.0;
const BONUS_HIDDEN: f64 = 10.0;
const BONUS_EXHAUSTION: f64 = 10.0;
const BONUS_AGREEMENT: f64 = 10.0;

/// Net momentum direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MomentumDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for MomentumDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Crossover state of the trend-following oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Inflection {
    /// Histogram clearly positive.
    Bullish,
    /// Histogram clearly negative.
    Bearish,
    /// Weakly positive — a bullish cross is forming.
    EarlyBullish,
    /// Weakly negative — just crossed under.
    EarlyCrossed,
    Neutral,
}

impl std::fmt::Display for Inflection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::EarlyBullish => write!(f, "EARLY_BULLISH"),
            Self::EarlyCrossed => write!(f, "EARLY_CROSSED"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Price-vs-oscillator pivot disagreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Divergence {
    Bullish,
    Bearish,
    None,
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// Snapshot of the momentum analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Momentum {
    pub direction: MomentumDirection,
    pub inflection: Inflection,
    pub divergence: Divergence,
    pub hidden_divergence: Divergence,
    pub exhaustion: bool,
    /// Whether `direction` is consistent with the crossover-oscillator state
    /// (neutral always agrees).
    pub agreement: bool,
    /// Composite signal strength in [0, 100].
    pub strength: f64,
}

/// Analyze the candle window (most-recent-first) for momentum structure.
pub fn analyze(window: &[Candle]) -> Result<Momentum, EngineError> {
    if window.len() < MIN_CANDLES {
        return Err(EngineError::insufficient(
            Stage::Momentum,
            MIN_CANDLES,
            window.len(),
        ));
    }

    let price = window[0].close;

    // Oldest-first closes with warm-up so the oscillator covers the last
    // HISTORY_BARS bars.
    let closes = closes_oldest_first(window, HISTORY_BARS + OSCILLATOR_WARMUP);
    let osc_full = oscillator_series(&closes, OSCILLATOR_PERIOD);

    // Align: the last L oscillator values correspond to the last L closes.
    let aligned_len = osc_full.len().min(HISTORY_BARS).min(closes.len());
    let oscs = &osc_full[osc_full.len() - aligned_len..];
    let prices = &closes[closes.len() - aligned_len..];
    let current_osc = oscs.last().copied().unwrap_or(50.0);

    // --- Inflection from the MACD histogram -----------------------------------
    let macd = calculate_macd(&closes);
    let inflection = match &macd {
        Some(m) => classify_inflection(m.histogram_bps(price)),
        None => Inflection::Neutral,
    };

    // --- Divergence (pivot pairing, with simplified fallback) ------------------
    let (divergence, hidden_divergence) = if aligned_len >= MIN_PIVOT_HISTORY {
        pivot_divergences(prices, oscs)
    } else {
        (fallback_divergence(window, current_osc), Divergence::None)
    };

    // --- Exhaustion -----------------------------------------------------------
    let exhaustion = detect_exhaustion(window, current_osc);

    // --- Direction vote -------------------------------------------------------
    let mut bull = 0i32;
    let mut bear = 0i32;

    match inflection {
        Inflection::Bullish => bull += VOTE_CROSSOVER,
        Inflection::EarlyBullish => bull += VOTE_EARLY_CROSSOVER,
        Inflection::Bearish => bear += VOTE_CROSSOVER,
        Inflection::EarlyCrossed => bear += VOTE_EARLY_CROSSOVER,
        Inflection::Neutral => {}
    }
    match divergence {
        Divergence::Bullish => bull += VOTE_DIVERGENCE,
        Divergence::Bearish => bear += VOTE_DIVERGENCE,
        Divergence::None => {}
    }
    match hidden_divergence {
        Divergence::Bullish => bull += VOTE_HIDDEN,
        Divergence::Bearish => bear += VOTE_HIDDEN,
        Divergence::None => {}
    }

    // Exhaustion argues against whichever side currently dominates.
    if exhaustion {
        if bull > bear {
            bear += VOTE_EXHAUSTION_FLIP;
        } else if bear > bull {
            bull += VOTE_EXHAUSTION_FLIP;
        }
    }

    // Rising price on falling volume (or the mirror) is a tired move.
    match volume_divergence(window) {
        Some(MomentumDirection::Bullish) => bull -= VOTE_VOLUME_PENALTY,
        Some(MomentumDirection::Bearish) => bear -= VOTE_VOLUME_PENALTY,
        _ => {}
    }

    let direction = if bull > bear + VOTE_MARGIN {
        MomentumDirection::Bullish
    } else if bear > bull + VOTE_MARGIN {
        MomentumDirection::Bearish
    } else {
        MomentumDirection::Neutral
    };

    // --- Agreement with the crossover state ------------------------------------
    let agreement = match (&direction, &macd) {
        (MomentumDirection::Neutral, _) => true,
        (_, None) => true,
        (MomentumDirection::Bullish, Some(m)) => m.histogram >= 0.0,
        (MomentumDirection::Bearish, Some(m)) => m.histogram <= 0.0,
    };

    // --- Strength -------------------------------------------------------------
    let mut strength = STRENGTH_BASE;
    match inflection {
        Inflection::Bullish | Inflection::Bearish => strength += BONUS_CROSSOVER,
        Inflection::EarlyBullish | Inflection::EarlyCrossed => strength += BONUS_EARLY,
        Inflection::Neutral => {}
    }
    if divergence != Divergence::None {
        strength += BONUS_DIVERGENCE;
    }
    if hidden_divergence != Divergence::None {
        strength += BONUS_HIDDEN;
    }
    if exhaustion {
        strength += BONUS_EXHAUSTION;
    }
    if agreement {
        strength += BONUS_AGREEMENT;
    }
    let strength = strength.min(100.0);

    trace!(
        direction = %direction,
        inflection = %inflection,
        divergence = %divergence,
        hidden = %hidden_divergence,
        exhaustion,
        osc = format!("{:.1}", current_osc),
        strength = format!("{:.0}", strength),
        "momentum computed"
    );

    Ok(Momentum {
        direction,
        inflection,
        divergence,
        hidden_divergence,
        exhaustion,
        agreement,
        strength,
    })
}

/// Grade the MACD histogram (in basis points of price) into a crossover state.
fn classify_inflection(histogram_bps: f64) -> Inflection {
    if histogram_bps > EARLY_BAND_BPS {
        Inflection::Bullish
    } else if histogram_bps > 0.0 {
        Inflection::EarlyBullish
    } else if histogram_bps < -EARLY_BAND_BPS {
        Inflection::Bearish
    } else if histogram_bps < 0.0 {
        Inflection::EarlyCrossed
    } else {
        Inflection::Neutral
    }
}

/// Indices of local pivot highs/lows over a 5-bar window (oldest-first data).
fn pivot_indices(values: &[f64], highs: bool) -> Vec<usize> {
    let mut pivots = Vec::new();
    if values.len() < PIVOT_WING * 2 + 1 {
        return pivots;
    }
    for i in PIVOT_WING..values.len() - PIVOT_WING {
        let v = values[i];
        let is_pivot = (i - PIVOT_WING..=i + PIVOT_WING)
            .filter(|&j| j != i)
            .all(|j| if highs { v > values[j] } else { v < values[j] });
        if is_pivot {
            pivots.push(i);
        }
    }
    pivots
}

/// Regular and hidden divergence from the two most recent price pivots of each
/// kind, paired with oscillator values at the same indices.
fn pivot_divergences(prices: &[f64], oscs: &[f64]) -> (Divergence, Divergence) {
    let highs = pivot_indices(prices, true);
    let lows = pivot_indices(prices, false);

    let mut regular = Divergence::None;
    let mut hidden = Divergence::None;
    // Newest pivot wins when both sides produce a signal: track recency.
    let mut regular_at = 0usize;
    let mut hidden_at = 0usize;

    if let [.., p1, p2] = highs[..] {
        if prices[p2] > prices[p1] && oscs[p2] < oscs[p1] {
            regular = Divergence::Bearish;
            regular_at = p2;
        }
        if prices[p2] < prices[p1] && oscs[p2] > oscs[p1] {
            hidden = Divergence::Bearish;
            hidden_at = p2;
        }
    }
    if let [.., p1, p2] = lows[..] {
        if prices[p2] < prices[p1] && oscs[p2] > oscs[p1] && p2 >= regular_at {
            regular = Divergence::Bullish;
        }
        if prices[p2] > prices[p1] && oscs[p2] < oscs[p1] && p2 >= hidden_at {
            hidden = Divergence::Bullish;
        }
    }

    (regular, hidden)
}

/// Simplified short-history heuristic: a stretched move whose oscillator does
/// not confirm it. Used when pivot pairing has too little aligned history.
fn fallback_divergence(window: &[Candle], current_osc: f64) -> Divergence {
    let span = MIN_EXHAUSTION_CANDLES.min(window.len());
    let then = window[span - 1].close;
    if then.abs() < f64::EPSILON {
        return Divergence::None;
    }
    let change = (window[0].close - then) / then;
    if change > 0.0 && current_osc < FALLBACK_WEAK_OSC {
        Divergence::Bearish
    } else if change < 0.0 && current_osc > FALLBACK_STRONG_OSC {
        Divergence::Bullish
    } else {
        Divergence::None
    }
}

/// Exhaustion: at least two of four independent contraction/reversal signals.
fn detect_exhaustion(window: &[Candle], current_osc: f64) -> bool {
    if window.len() < MIN_EXHAUSTION_CANDLES {
        return false;
    }

    let mut signals = 0usize;

    // 1. Oscillator at an extreme.
    if current_osc > OVERBOUGHT || current_osc < OVERSOLD {
        signals += 1;
    }

    // 2. Candle-range contraction: recent 3-bar average vs the prior 3.
    let recent_range: f64 = window[..3].iter().map(Candle::range).sum::<f64>() / 3.0;
    let prior_range: f64 = window[3..6].iter().map(Candle::range).sum::<f64>() / 3.0;
    if prior_range > f64::EPSILON && recent_range < prior_range * RANGE_CONTRACTION_RATIO {
        signals += 1;
    }

    // 3. Volume contraction.
    let recent_vol: f64 = window[..3].iter().map(|c| c.volume).sum::<f64>() / 3.0;
    let prior_vol: f64 = window[3..6].iter().map(|c| c.volume).sum::<f64>() / 3.0;
    if prior_vol > f64::EPSILON && recent_vol < prior_vol * VOLUME_CONTRACTION_RATIO {
        signals += 1;
    }

    // 4. Reversal candle pattern on the latest bar.
    if reversal_pattern(&window[0], &window[1]) {
        signals += 1;
    }

    signals >= EXHAUSTION_SIGNALS_REQUIRED
}

/// Doji, long-wick reversal, or engulfing bar.
fn reversal_pattern(latest: &Candle, prior: &Candle) -> bool {
    let range = latest.range();
    let body = latest.body();

    // Doji: body is a sliver of the range.
    if range > f64::EPSILON && body < range * DOJI_BODY_FRACTION {
        return true;
    }

    // Long-wick reversal: either wick dwarfs the body.
    if body > f64::EPSILON
        && latest.upper_wick().max(latest.lower_wick()) > body * LONG_WICK_RATIO
    {
        return true;
    }

    // Engulfing: oversized body of the opposite color.
    if prior.body() > f64::EPSILON
        && body > prior.body() * ENGULFING_BODY_RATIO
        && latest.is_up() != prior.is_up()
    {
        return true;
    }

    false
}

/// Price trending one way while volume drains away.
fn volume_divergence(window: &[Candle]) -> Option<MomentumDirection> {
    let span = MIN_EXHAUSTION_CANDLES;
    if window.len() < span * 2 {
        return None;
    }
    let then = window[span - 1].close;
    if then.abs() < f64::EPSILON {
        return None;
    }
    let price_change = (window[0].close - then) / then;
    let recent_vol: f64 = window[..span].iter().map(|c| c.volume).sum();
    let prior_vol: f64 = window[span..span * 2].iter().map(|c| c.volume).sum();
    let volume_falling = recent_vol < prior_vol * VOLUME_CONTRACTION_RATIO;

    if !volume_falling {
        return None;
    }
    if price_change > 0.0 {
        Some(MomentumDirection::Bullish) // The bullish case is the suspect one.
    } else if price_change < 0.0 {
        Some(MomentumDirection::Bearish)
    } else {
        None
    }
}
