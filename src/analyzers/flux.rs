// =============================================================================
// Flux Detector — multi-window velocity, acceleration, and breakout odds
// =============================================================================
//
// Velocity at window size w is the per-bar price change across the last w
// bars, weighted by the ratio of that window's average volume to the full
// window's average volume (a move on rising volume counts for more; the
// weight is capped at 2x). Acceleration compares the most recent 50-bar
// velocity against the prior 50 bars. Momentum is volume-weighted candle body
// flow over the last 20 bars, normalized into [-1, 1].
//
// Breakout probability accumulates four graded conditions and is capped at
// 1.0; direction comes from the average of the three velocities against a
// small deadband proportional to the latest price.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{EngineError, Stage};
use crate::market_data::{avg_volume, Candle};

/// Minimum window length for this analyzer.
pub const MIN_CANDLES: usize = 100;

/// The three velocity windows (bars).
pub const WINDOW_SHORT: usize = 20;
pub const WINDOW_MID: usize = 50;
pub const WINDOW_LONG: usize = 100;

/// Bars used for the volume-weighted momentum sum.
const MOMENTUM_BARS: usize = 20;

/// Cap on the volume-ratio weight applied to each velocity.
const VOLUME_WEIGHT_CAP: f64 = 2.0;

/// Acceleration threshold as a fraction of the latest close (per bar^2).
const ACCEL_THRESHOLD_FRAC: f64 = 1e-5;

/// Momentum magnitude that counts as breakout-grade.
const MOMENTUM_THRESHOLD: f64 = 0.3;

/// Short-window velocity that counts as strong, as a fraction of price.
const STRONG_VELOCITY_FRAC: f64 = 1e-3;

/// Direction deadband as a fraction of the latest close.
const DIRECTION_DEADBAND_FRAC: f64 = 1e-4;

/// Velocity magnitude (fraction of price per bar) that saturates strength.
const STRENGTH_VELOCITY_FRAC: f64 = 2e-3;

/// Breakout-probability contributions.
const P_VELOCITY_RAMP: f64 = 0.3;
const P_ACCELERATION: f64 = 0.25;
const P_MOMENTUM: f64 = 0.25;
const P_STRONG_SHORT: f64 = 0.2;

/// Net direction of price flux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FluxDirection {
    Up,
    Down,
    Sideways,
}

impl std::fmt::Display for FluxDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
            Self::Sideways => write!(f, "SIDEWAYS"),
        }
    }
}

/// Snapshot of the flux analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flux {
    /// Volume-weighted per-bar velocity over the last 20 bars (price units).
    pub velocity_short: f64,
    /// Over the last 50 bars.
    pub velocity_mid: f64,
    /// Over the last 100 bars.
    pub velocity_long: f64,
    /// Change in 50-bar velocity between the two most recent 50-bar spans.
    pub acceleration: f64,
    /// Volume-weighted body flow over the last 20 bars, in [-1, 1].
    pub momentum: f64,
    pub breakout_probability: f64,
    pub direction: FluxDirection,
    pub strength: f64,
}

/// Analyze the candle window (most-recent-first) for price flux.
pub fn analyze(window: &[Candle]) -> Result<Flux, EngineError> {
    if window.len() < MIN_CANDLES {
        return Err(EngineError::insufficient(
            Stage::Flux,
            MIN_CANDLES,
            window.len(),
        ));
    }

    let price = window[0].close;
    let base_volume = avg_volume(window, window.len());

    let velocity_short = weighted_velocity(window, WINDOW_SHORT, base_volume);
    let velocity_mid = weighted_velocity(window, WINDOW_MID, base_volume);
    let velocity_long = weighted_velocity(window, WINDOW_LONG, base_volume);

    // --- Acceleration: recent 50-bar velocity minus the prior 50 ------------
    let recent_v = raw_velocity(&window[..WINDOW_MID]);
    let prior_v = raw_velocity(&window[WINDOW_MID..WINDOW_MID * 2]);
    let acceleration = (recent_v - prior_v) / WINDOW_MID as f64;

    // --- Volume-weighted momentum over the last 20 bars ----------------------
    let momentum = body_flow_momentum(&window[..MOMENTUM_BARS]);

    // --- Breakout probability -------------------------------------------------
    let mut breakout = 0.0_f64;
    if velocity_short.abs() > velocity_mid.abs() && velocity_mid.abs() > velocity_long.abs() {
        breakout += P_VELOCITY_RAMP;
    }
    if acceleration.abs() > price.abs() * ACCEL_THRESHOLD_FRAC {
        breakout += P_ACCELERATION;
    }
    if momentum.abs() > MOMENTUM_THRESHOLD {
        breakout += P_MOMENTUM;
    }
    if velocity_short.abs() > price.abs() * STRONG_VELOCITY_FRAC {
        breakout += P_STRONG_SHORT;
    }
    let breakout_probability = breakout.min(1.0);

    // --- Direction against the deadband --------------------------------------
    let avg_velocity = (velocity_short + velocity_mid + velocity_long) / 3.0;
    let deadband = price.abs() * DIRECTION_DEADBAND_FRAC;
    let direction = if avg_velocity > deadband {
        FluxDirection::Up
    } else if avg_velocity < -deadband {
        FluxDirection::Down
    } else {
        FluxDirection::Sideways
    };

    // --- Strength: 70% velocity magnitude, 30% acceleration magnitude --------
    let vel_norm = if price.abs() < f64::EPSILON {
        0.0
    } else {
        (avg_velocity.abs() / (price.abs() * STRENGTH_VELOCITY_FRAC)).min(1.0)
    };
    let acc_norm = if price.abs() < f64::EPSILON {
        0.0
    } else {
        (acceleration.abs() / (price.abs() * ACCEL_THRESHOLD_FRAC * 10.0)).min(1.0)
    };
    let strength = (0.7 * vel_norm + 0.3 * acc_norm).min(1.0);

    trace!(
        v_short = format!("{:.6}", velocity_short),
        v_mid = format!("{:.6}", velocity_mid),
        v_long = format!("{:.6}", velocity_long),
        accel = format!("{:.8}", acceleration),
        momentum = format!("{:.4}", momentum),
        breakout = format!("{:.2}", breakout_probability),
        direction = %direction,
        "flux computed"
    );

    Ok(Flux {
        velocity_short,
        velocity_mid,
        velocity_long,
        acceleration,
        momentum,
        breakout_probability,
        direction,
        strength,
    })
}

/// Per-bar close change over the slice (most-recent-first): latest close minus
/// the oldest close of the span, divided by its length.
fn raw_velocity(span: &[Candle]) -> f64 {
    if span.is_empty() {
        return 0.0;
    }
    (span[0].close - span[span.len() - 1].close) / span.len() as f64
}

/// Raw velocity over the last `w` bars, weighted by the window-vs-baseline
/// average-volume ratio (capped).
fn weighted_velocity(window: &[Candle], w: usize, base_volume: f64) -> f64 {
    let velocity = raw_velocity(&window[..w]);
    if base_volume < f64::EPSILON {
        return velocity;
    }
    let ratio = (avg_volume(window, w) / base_volume).min(VOLUME_WEIGHT_CAP);
    velocity * ratio
}

/// Sum of (close - open) * volume, normalized by the total absolute flow into
/// [-1, 1]. A zero denominator (flat bars or zero volume) maps to 0.
fn body_flow_momentum(span: &[Candle]) -> f64 {
    let signed: f64 = span.iter().map(|c| (c.close - c.open) * c.volume).sum();
    let total: f64 = span.iter().map(|c| c.body() * c.volume).sum();
    if total < f64::EPSILON {
        0.0
    } else {
        (signed / total).clamp(-1.0, 1.0)
    }
}
