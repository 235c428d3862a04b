// =============================================================================
// Bayesian Aggregator — posterior, expected return, half-Kelly sizing
// =============================================================================
//
// Folds the directional analyzer snapshots into one probabilistic verdict:
//
//   prior      = probability of the dominant market state
//   likelihood = 0.25 per confirming factor (strong state, breakout-grade
//                flux, active whale-backed flow, benign regime), capped 0.95
//   evidence   = weighted analyzer-strength average, floored at 0.1
//   posterior  = clamp(likelihood * prior / evidence, 0, 1)
//
// Expected return uses a fixed average-loss baseline (see `EngineConfig`) and
// an average win of 15 + 5 * |flux momentum| price units. The Kelly fraction
// (p*b - q)/b is applied at half strength and clamped to [0, 0.25].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::{Flux, OrderFlow, RegimeRisk, StateProbability};
use crate::analyzers::regime::MarketRegime;
use crate::config::EngineConfig;

/// Likelihood contribution of each confirming factor.
const LIKELIHOOD_STEP: f64 = 0.25;

/// Likelihood ceiling.
const LIKELIHOOD_CAP: f64 = 0.95;

/// State-probability strength at or above which the state factor confirms.
const STRONG_STATE: f64 = 0.6;

/// Flux strength and breakout probability gates for the flux factor.
const STRONG_FLUX: f64 = 0.6;
const BREAKOUT_CAPABLE: f64 = 0.5;

/// Regime risk below which the regime factor confirms.
const BENIGN_RISK: f64 = 0.7;

/// Evidence blend weights.
const W_EV_STATE: f64 = 0.30;
const W_EV_FLUX: f64 = 0.25;
const W_EV_FLOW: f64 = 0.25;
const W_EV_RISK: f64 = 0.20;

/// Floor preventing a division blow-up in the posterior.
const EVIDENCE_FLOOR: f64 = 0.1;

/// Risk/reward formula terms and bounds.
const RR_BASE: f64 = 2.0;
const RR_POSTERIOR_GAIN: f64 = 4.0;
const RR_RISK_PENALTY: f64 = 1.5;
const RR_MIN: f64 = 1.0;
const RR_MAX: f64 = 5.0;

/// Confidence blend weights.
const W_CONF_POSTERIOR: f64 = 0.5;
const W_CONF_LIKELIHOOD: f64 = 0.3;
const W_CONF_EVIDENCE: f64 = 0.2;

/// Quality-class confidence thresholds.
const QUALITY_EXCELLENT: f64 = 0.80;
const QUALITY_GOOD: f64 = 0.65;
const QUALITY_FAIR: f64 = 0.50;

/// Coarse quality classification of the aggregated signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl std::fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poor => write!(f, "POOR"),
            Self::Fair => write!(f, "FAIR"),
            Self::Good => write!(f, "GOOD"),
            Self::Excellent => write!(f, "EXCELLENT"),
        }
    }
}

/// Output of the Bayesian aggregation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BayesianResult {
    pub prior: f64,
    pub likelihood: f64,
    pub evidence: f64,
    pub posterior: f64,
    /// Signed, in price units.
    pub expected_return: f64,
    /// Clamped to [1, 5].
    pub risk_reward: f64,
    /// Half-Kelly fraction, clamped to [0, 0.25].
    pub position_size: f64,
    pub confidence: f64,
    pub quality: SignalQuality,
}

/// Combine the analyzer snapshots into a Bayesian verdict.
pub fn aggregate(
    config: &EngineConfig,
    state: &StateProbability,
    flux: &Flux,
    flow: &OrderFlow,
    regime: &RegimeRisk,
) -> BayesianResult {
    let prior = state.dominant_probability();

    // --- Likelihood: four confirming factors ----------------------------------
    let mut likelihood = 0.0_f64;
    if state.strength >= STRONG_STATE {
        likelihood += LIKELIHOOD_STEP;
    }
    if flux.strength >= STRONG_FLUX && flux.breakout_probability >= BREAKOUT_CAPABLE {
        likelihood += LIKELIHOOD_STEP;
    }
    if flow.direction != crate::analyzers::FlowDirection::Neutral && flow.whale_count > 0 {
        likelihood += LIKELIHOOD_STEP;
    }
    if regime.regime != MarketRegime::Chaotic && regime.risk_level < BENIGN_RISK {
        likelihood += LIKELIHOOD_STEP;
    }
    let likelihood = likelihood.min(LIKELIHOOD_CAP);

    // --- Evidence: weighted strengths, floored --------------------------------
    let evidence = (W_EV_STATE * state.strength
        + W_EV_FLUX * flux.strength
        + W_EV_FLOW * flow.strength
        + W_EV_RISK * (1.0 - regime.risk_level))
        .max(EVIDENCE_FLOOR);

    let posterior = (likelihood * prior / evidence).clamp(0.0, 1.0);

    // --- Expected return ------------------------------------------------------
    let avg_win = config.avg_win_base + config.avg_win_momentum_bonus * flux.momentum.abs();
    let expected_return = posterior * avg_win - (1.0 - posterior) * config.avg_loss_baseline;

    // --- Risk/reward ----------------------------------------------------------
    let risk_reward = (RR_BASE + RR_POSTERIOR_GAIN * (posterior - 0.5)
        - RR_RISK_PENALTY * regime.risk_level)
        .clamp(RR_MIN, RR_MAX);

    // --- Position size: Kelly at half strength --------------------------------
    let position_size = kelly_fraction(posterior, risk_reward, config);

    // --- Confidence and quality -----------------------------------------------
    let confidence = (W_CONF_POSTERIOR * posterior
        + W_CONF_LIKELIHOOD * likelihood
        + W_CONF_EVIDENCE * evidence)
        .min(1.0);
    let quality = classify_quality(confidence);

    debug!(
        prior = format!("{:.3}", prior),
        likelihood = format!("{:.3}", likelihood),
        evidence = format!("{:.3}", evidence),
        posterior = format!("{:.3}", posterior),
        rr = format!("{:.2}", risk_reward),
        kelly = format!("{:.4}", position_size),
        quality = %quality,
        "bayesian aggregation complete"
    );

    BayesianResult {
        prior,
        likelihood,
        evidence,
        posterior,
        expected_return,
        risk_reward,
        position_size,
        confidence,
        quality,
    }
}

/// Kelly fraction (p*b - q)/b, halved when configured, clamped to
/// [0, max_position_fraction].
fn kelly_fraction(posterior: f64, risk_reward: f64, config: &EngineConfig) -> f64 {
    let p = posterior;
    let q = 1.0 - p;
    let b = risk_reward.max(f64::EPSILON);
    let mut kelly = (p * b - q) / b;
    if config.half_kelly {
        kelly *= 0.5;
    }
    kelly.clamp(0.0, config.max_position_fraction)
}

/// Confidence into a coarse quality class.
fn classify_quality(confidence: f64) -> SignalQuality {
    if confidence >= QUALITY_EXCELLENT {
        SignalQuality::Excellent
    } else if confidence >= QUALITY_GOOD {
        SignalQuality::Good
    } else if confidence >= QUALITY_FAIR {
        SignalQuality::Fair
    } else {
        SignalQuality::Poor
    }
}
