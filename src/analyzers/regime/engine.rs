// =============================================================================
// Regime/Risk Engine — chaos metrics, regime classification, scalar risk
// =============================================================================
//
// Combines five metrics computed over the candle window:
//
//   - sensitivity exponent   (Lyapunov-style divergence, [-1, 1])
//   - fractal dimension      (box counting, [1, 2])
//   - return entropy         (10-bin histogram, [0, 1])
//   - annualized volatility  (std-dev of returns, capped at 1.0)
//   - persistence exponent   (R/S analysis, [0, 1])
//
// Classification (first match wins):
//
//   CHAOTIC        — sensitivity > 0.2 AND entropy > 0.7
//   TRENDING       — persistence > 0.6
//   MEAN-REVERTING — persistence < 0.4
//   STABLE         — otherwise
//
// Risk level = 0.4 * volatility + 0.3 * entropy + 0.3 * chaos probability.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::regime::entropy::return_entropy;
use crate::analyzers::regime::fractal::{fractal_dimension, sensitivity_exponent};
use crate::analyzers::regime::hurst::persistence_exponent;
use crate::error::{EngineError, Stage};
use crate::market_data::{closes_oldest_first, Candle};

/// Minimum window length for this analyzer.
pub const MIN_CANDLES: usize = 100;

/// Bars per year at 1-minute sampling on a 24/7 market (365 * 24 * 60).
/// Heuristic tuning constant — the decision-layer thresholds assume it, so it
/// is preserved rather than re-derived for other sampling intervals.
pub const ANNUALIZATION_FACTOR: f64 = 525_600.0;

/// Chaos-probability contributions (sum to 1.0).
const P_SENSITIVITY: f64 = 0.30;
const P_FRACTAL: f64 = 0.25;
const P_ENTROPY: f64 = 0.25;
const P_VOLATILITY: f64 = 0.20;

/// Thresholds for the chaos-probability booleans.
const SENSITIVE_ABOVE: f64 = 0.0;
const ROUGH_ABOVE: f64 = 1.5;
const NOISY_ABOVE: f64 = 0.7;
const VOLATILE_ABOVE: f64 = 0.5;

/// Classification thresholds.
const CHAOTIC_SENSITIVITY: f64 = 0.2;
const CHAOTIC_ENTROPY: f64 = 0.7;
const TRENDING_PERSISTENCE: f64 = 0.6;
const REVERTING_PERSISTENCE: f64 = 0.4;

/// Risk-level blend weights.
const W_VOLATILITY: f64 = 0.4;
const W_ENTROPY: f64 = 0.3;
const W_CHAOS: f64 = 0.3;

/// Market regime classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketRegime {
    Stable,
    Trending,
    MeanReverting,
    Chaotic,
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "STABLE"),
            Self::Trending => write!(f, "TRENDING"),
            Self::MeanReverting => write!(f, "MEAN_REVERTING"),
            Self::Chaotic => write!(f, "CHAOTIC"),
        }
    }
}

/// Snapshot of all regime metrics plus the classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeRisk {
    pub sensitivity_exponent: f64,
    pub fractal_dimension: f64,
    pub entropy: f64,
    pub volatility: f64,
    pub persistence_exponent: f64,
    pub chaos_probability: f64,
    pub regime: MarketRegime,
    pub risk_level: f64,
}

/// Analyze the candle window (most-recent-first) for regime and risk.
pub fn analyze(window: &[Candle]) -> Result<RegimeRisk, EngineError> {
    if window.len() < MIN_CANDLES {
        return Err(EngineError::insufficient(
            Stage::RegimeRisk,
            MIN_CANDLES,
            window.len(),
        ));
    }

    let closes = closes_oldest_first(window, window.len());

    let sensitivity = sensitivity_exponent(&closes);
    let fractal = fractal_dimension(&closes);
    let entropy = return_entropy(&closes);
    let volatility = annualized_volatility(&closes);
    let persistence = persistence_exponent(&closes);

    // --- Chaos probability: four weighted booleans ---------------------------
    let mut chaos = 0.0_f64;
    if sensitivity > SENSITIVE_ABOVE {
        chaos += P_SENSITIVITY;
    }
    if fractal > ROUGH_ABOVE {
        chaos += P_FRACTAL;
    }
    if entropy > NOISY_ABOVE {
        chaos += P_ENTROPY;
    }
    if volatility > VOLATILE_ABOVE {
        chaos += P_VOLATILITY;
    }
    let chaos_probability = chaos.clamp(0.0, 1.0);

    // --- Classification (ordered; first match wins) ---------------------------
    let regime = if sensitivity > CHAOTIC_SENSITIVITY && entropy > CHAOTIC_ENTROPY {
        MarketRegime::Chaotic
    } else if persistence > TRENDING_PERSISTENCE {
        MarketRegime::Trending
    } else if persistence < REVERTING_PERSISTENCE {
        MarketRegime::MeanReverting
    } else {
        MarketRegime::Stable
    };

    let risk_level =
        (W_VOLATILITY * volatility + W_ENTROPY * entropy + W_CHAOS * chaos_probability)
            .clamp(0.0, 1.0);

    debug!(
        regime = %regime,
        sensitivity = format!("{:.4}", sensitivity),
        fractal = format!("{:.3}", fractal),
        entropy = format!("{:.4}", entropy),
        volatility = format!("{:.4}", volatility),
        persistence = format!("{:.4}", persistence),
        risk = format!("{:.4}", risk_level),
        "regime classified"
    );

    Ok(RegimeRisk {
        sensitivity_exponent: sensitivity,
        fractal_dimension: fractal,
        entropy,
        volatility,
        persistence_exponent: persistence,
        chaos_probability,
        regime,
        risk_level,
    })
}

/// Annualized standard deviation of bar-to-bar returns, capped at 1.0.
fn annualized_volatility(closes: &[f64]) -> f64 {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0].abs() > f64::EPSILON)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    (variance.sqrt() * ANNUALIZATION_FACTOR.sqrt()).min(1.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn window_from_closes(series: &[f64]) -> Vec<Candle> {
        // Build a most-recent-first window from an oldest-first close series.
        series
            .iter()
            .enumerate()
            .rev()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { series[i - 1] };
                Candle {
                    open_time: i as i64 * 60_000,
                    open,
                    high: open.max(close),
                    low: open.min(close),
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    fn flat_window(len: usize) -> Vec<Candle> {
        window_from_closes(&vec![100.0; len])
    }

    #[test]
    fn insufficient_data_is_rejected() {
        assert!(matches!(
            analyze(&flat_window(99)),
            Err(EngineError::InsufficientData { required: 100, .. })
        ));
    }

    #[test]
    fn flat_window_is_calm_and_stable() {
        let regime = analyze(&flat_window(200)).unwrap();
        assert!(regime.risk_level < 1e-9, "risk = {}", regime.risk_level);
        assert!(
            regime.chaos_probability < 1e-9,
            "chaos = {}",
            regime.chaos_probability
        );
        assert_eq!(regime.regime, MarketRegime::Stable);
        assert!(regime.volatility.abs() < 1e-12);
        assert!(regime.entropy.abs() < 1e-12);
    }

    #[test]
    fn strong_trend_classifies_trending() {
        let closes: Vec<f64> = {
            let mut price = 100.0;
            (0..200)
                .map(|i| {
                    price += 0.5 + 0.1 * (i as f64).sin().abs();
                    price
                })
                .collect()
        };
        let regime = analyze(&window_from_closes(&closes)).unwrap();
        assert!(regime.persistence_exponent > TRENDING_PERSISTENCE);
        assert_eq!(regime.regime, MarketRegime::Trending);
    }

    #[test]
    fn tight_oscillation_classifies_mean_reverting() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 100.0 + if i % 2 == 0 { 2.0 } else { -2.0 })
            .collect();
        let regime = analyze(&window_from_closes(&closes)).unwrap();
        assert!(regime.persistence_exponent < REVERTING_PERSISTENCE);
        assert_eq!(regime.regime, MarketRegime::MeanReverting);
    }

    #[test]
    fn all_fields_in_documented_ranges() {
        let mut state = 1_234_567_u64;
        let mut price = 100.0;
        let closes: Vec<f64> = (0..300)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                price *= 1.0 + ((state as f64 / u64::MAX as f64) - 0.5) * 0.03;
                price
            })
            .collect();
        let regime = analyze(&window_from_closes(&closes)).unwrap();
        assert!((-1.0..=1.0).contains(&regime.sensitivity_exponent));
        assert!((1.0..=2.0).contains(&regime.fractal_dimension));
        assert!((0.0..=1.0).contains(&regime.entropy));
        assert!((0.0..=1.0).contains(&regime.volatility));
        assert!((0.0..=1.0).contains(&regime.persistence_exponent));
        assert!((0.0..=1.0).contains(&regime.chaos_probability));
        assert!((0.0..=1.0).contains(&regime.risk_level));
    }

    #[test]
    fn noisy_window_scores_high_risk() {
        let mut state = 42_u64;
        let mut price = 100.0;
        let closes: Vec<f64> = (0..300)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                price *= 1.0 + ((state as f64 / u64::MAX as f64) - 0.5) * 0.06;
                price
            })
            .collect();
        let noisy = analyze(&window_from_closes(&closes)).unwrap();
        let calm = analyze(&flat_window(300)).unwrap();
        assert!(
            noisy.risk_level > calm.risk_level,
            "noise risk {} should exceed flat risk {}",
            noisy.risk_level,
            calm.risk_level
        );
    }

    #[test]
    fn deterministic_across_runs() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 100.0 + 5.0 * ((i as f64) * 0.31).sin())
            .collect();
        let window = window_from_closes(&closes);
        let a = analyze(&window).unwrap();
        let b = analyze(&window).unwrap();
        assert_eq!(a.risk_level.to_bits(), b.risk_level.to_bits());
        assert_eq!(a.regime, b.regime);
    }
}
