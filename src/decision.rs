// =============================================================================
// Decision Maker — final trade verdict from the Bayesian verdict + analyzers
// =============================================================================
//
// Three composite scores feed an ensemble confidence:
//
//   signal_strength   = 0.4 * flux + 0.3 * order-flow + 0.3 * momentum/100
//   signal_confidence = momentum/100, discounted when momentum disagrees
//                       with its own crossover state
//   factor_score      = state, breakout, flow-confidence and inverse-risk blend
//
// Abort checks run as an ordered cascade: every tripped gate is recorded in
// cascade order and the FIRST one decides; only when every gate passes do the
// execute triggers get a look. An abort always zeroes the position size. A
// wait keeps the Kelly size as advisory.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzers::{
    Divergence, FlowDirection, Flux, FluxDirection, Momentum, OrderFlow, RegimeRisk,
    StateProbability,
};
use crate::bayes::{BayesianResult, SignalQuality};

/// Signal-strength composite weights.
const W_SIG_FLUX: f64 = 0.4;
const W_SIG_FLOW: f64 = 0.3;
const W_SIG_MOMENTUM: f64 = 0.3;

/// Discount applied to signal confidence when momentum disagrees with its
/// crossover oscillator.
const DISAGREEMENT_DISCOUNT: f64 = 0.7;

/// Factor-score blend weights.
const W_FS_STATE: f64 = 0.30;
const W_FS_BREAKOUT: f64 = 0.25;
const W_FS_FLOW_CONF: f64 = 0.25;
const W_FS_INV_RISK: f64 = 0.20;

/// Ensemble confidence weights.
const W_OC_POSTERIOR: f64 = 0.30;
const W_OC_BAYES_CONF: f64 = 0.20;
const W_OC_SIGNAL_CONF: f64 = 0.20;
const W_OC_SIGNAL_STR: f64 = 0.15;
const W_OC_INV_RISK: f64 = 0.10;
const W_OC_FACTOR: f64 = 0.05;

/// Abort thresholds, applied in cascade order.
const ABORT_RISK: f64 = 0.80;
const ABORT_POSTERIOR: f64 = 0.50;
const ABORT_CONFIDENCE: f64 = 0.50;
const ABORT_RISK_REWARD: f64 = 1.2;
const ABORT_SIGNAL_STRENGTH: f64 = 0.40;
const ABORT_FACTOR_SCORE: f64 = 0.35;

/// Execute thresholds.
const EXEC_POSTERIOR: f64 = 0.75;
const EXEC_CONFIDENCE: f64 = 0.75;
const EXEC_RISK: f64 = 0.30;
const EXEC_RISK_REWARD: f64 = 2.5;
const EXEC_SIGNAL_STRENGTH: f64 = 0.75;
const EXEC_FACTOR_SCORE: f64 = 0.70;

/// Relaxed bounds for the partial execute triggers.
const EXEC_ALT_RISK: f64 = 0.40;
const EXEC_ALT_RISK_REWARD: f64 = 2.0;
const EXEC_ALT_RISK_WIDE: f64 = 0.50;

/// Warning thresholds.
const WARN_RISK: f64 = 0.60;

/// Quality-score term weights (sums to 10 at the ideal corner).
const QS_CONFIDENCE: f64 = 3.0;
const QS_POSTERIOR: f64 = 2.5;
const QS_INV_RISK: f64 = 2.0;
const QS_RISK_REWARD: f64 = 2.5;
const QS_CAP: f64 = 10.0;

/// Final verdict on the evaluated window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    Execute,
    Wait,
    Abort,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Execute => write!(f, "EXECUTE"),
            Self::Wait => write!(f, "WAIT"),
            Self::Abort => write!(f, "ABORT"),
        }
    }
}

/// Trade side implied by the directional analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
    Flat,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Flat => write!(f, "FLAT"),
        }
    }
}

/// Output of the decision stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDecision {
    pub action: TradeAction,
    pub side: TradeSide,
    /// Ordered reasons behind the action. For aborts, every tripped gate in
    /// cascade order with the deciding gate first.
    pub reasons: Vec<String>,
    pub confidence: f64,
    pub signal_strength: f64,
    pub signal_confidence: f64,
    pub factor_score: f64,
    /// Posterior the decision was made on.
    pub posterior: f64,
    /// Risk/reward the decision was made on, in [1, 5].
    pub risk_reward: f64,
    /// Regime risk the decision was made on, in [0, 1].
    pub risk_level: f64,
    /// Kelly fraction; zero on abort, advisory on wait.
    pub position_size: f64,
    /// 0-10 composite for at-a-glance grading.
    pub quality_score: f64,
    pub warnings: Vec<String>,
}

/// Fold the Bayesian verdict and analyzer snapshots into a trade decision.
pub fn decide(
    state: &StateProbability,
    flux: &Flux,
    flow: &OrderFlow,
    regime: &RegimeRisk,
    momentum: &Momentum,
    bayes: &BayesianResult,
) -> TradeDecision {
    let signal_strength = W_SIG_FLUX * flux.strength
        + W_SIG_FLOW * flow.strength
        + W_SIG_MOMENTUM * (momentum.strength / 100.0);

    let mut signal_confidence = momentum.strength / 100.0;
    if !momentum.agreement {
        signal_confidence *= DISAGREEMENT_DISCOUNT;
    }

    let factor_score = W_FS_STATE * state.strength
        + W_FS_BREAKOUT * flux.breakout_probability
        + W_FS_FLOW_CONF * flow.confidence
        + W_FS_INV_RISK * (1.0 - regime.risk_level);

    let confidence = W_OC_POSTERIOR * bayes.posterior
        + W_OC_BAYES_CONF * bayes.confidence
        + W_OC_SIGNAL_CONF * signal_confidence
        + W_OC_SIGNAL_STR * signal_strength
        + W_OC_INV_RISK * (1.0 - regime.risk_level)
        + W_OC_FACTOR * factor_score;

    let side = implied_side(flux, flow);
    let warnings = collect_warnings(flux, flow, regime, momentum, side);

    let quality_score = (QS_CONFIDENCE * confidence
        + QS_POSTERIOR * bayes.posterior
        + QS_INV_RISK * (1.0 - regime.risk_level)
        + QS_RISK_REWARD * (bayes.risk_reward / 5.0).min(1.0))
    .min(QS_CAP);

    // --- Abort cascade: every tripped gate recorded, the first decides --------
    let failed_gates = tripped_gates(regime, bayes, confidence, signal_strength, factor_score);
    if !failed_gates.is_empty() {
        info!(side = %side, reason = %failed_gates[0], "decision: abort");
        return TradeDecision {
            action: TradeAction::Abort,
            side,
            reasons: failed_gates,
            confidence,
            signal_strength,
            signal_confidence,
            factor_score,
            posterior: bayes.posterior,
            risk_reward: bayes.risk_reward,
            risk_level: regime.risk_level,
            position_size: 0.0,
            quality_score,
            warnings,
        };
    }

    // --- Execute triggers -----------------------------------------------------
    let (action, reason) = if let Some(trigger) =
        execute_trigger(bayes, confidence, regime.risk_level, signal_strength, factor_score)
    {
        (TradeAction::Execute, trigger)
    } else {
        (
            TradeAction::Wait,
            "all gates passed but no execute trigger fired".to_string(),
        )
    };

    debug!(
        action = %action,
        side = %side,
        conf = format!("{:.3}", confidence),
        sig = format!("{:.3}", signal_strength),
        factor = format!("{:.3}", factor_score),
        qs = format!("{:.2}", quality_score),
        "decision composed"
    );

    TradeDecision {
        action,
        side,
        reasons: vec![reason],
        confidence,
        signal_strength,
        signal_confidence,
        factor_score,
        posterior: bayes.posterior,
        risk_reward: bayes.risk_reward,
        risk_level: regime.risk_level,
        position_size: bayes.position_size,
        quality_score,
        warnings,
    }
}

/// Ordered abort cascade; returns every tripped gate, deciding gate first.
fn tripped_gates(
    regime: &RegimeRisk,
    bayes: &BayesianResult,
    confidence: f64,
    signal_strength: f64,
    factor_score: f64,
) -> Vec<String> {
    let mut gates = Vec::new();
    if regime.risk_level > ABORT_RISK {
        gates.push(format!(
            "risk level {:.2} exceeds {:.2}",
            regime.risk_level, ABORT_RISK
        ));
    }
    if bayes.posterior < ABORT_POSTERIOR {
        gates.push(format!(
            "posterior {:.2} below {:.2}",
            bayes.posterior, ABORT_POSTERIOR
        ));
    }
    if confidence < ABORT_CONFIDENCE {
        gates.push(format!(
            "overall confidence {:.2} below {:.2}",
            confidence, ABORT_CONFIDENCE
        ));
    }
    if bayes.risk_reward < ABORT_RISK_REWARD {
        gates.push(format!(
            "risk/reward {:.2} below {:.2}",
            bayes.risk_reward, ABORT_RISK_REWARD
        ));
    }
    if bayes.quality == SignalQuality::Poor {
        gates.push("signal quality graded poor".to_string());
    }
    if signal_strength < ABORT_SIGNAL_STRENGTH {
        gates.push(format!(
            "signal strength {:.2} below {:.2}",
            signal_strength, ABORT_SIGNAL_STRENGTH
        ));
    }
    if factor_score < ABORT_FACTOR_SCORE {
        gates.push(format!(
            "factor score {:.2} below {:.2}",
            factor_score, ABORT_FACTOR_SCORE
        ));
    }
    gates
}

/// Execute triggers, strongest first. Returns the trigger description.
fn execute_trigger(
    bayes: &BayesianResult,
    confidence: f64,
    risk: f64,
    signal_strength: f64,
    factor_score: f64,
) -> Option<String> {
    if bayes.posterior >= EXEC_POSTERIOR
        && confidence >= EXEC_CONFIDENCE
        && risk < EXEC_RISK
        && bayes.risk_reward >= EXEC_RISK_REWARD
        && signal_strength >= EXEC_SIGNAL_STRENGTH
        && factor_score >= EXEC_FACTOR_SCORE
    {
        return Some("all execute criteria satisfied".to_string());
    }
    if bayes.posterior >= EXEC_POSTERIOR && risk < EXEC_ALT_RISK && bayes.risk_reward >= EXEC_ALT_RISK_REWARD {
        return Some("strong posterior with contained risk".to_string());
    }
    if confidence >= EXEC_CONFIDENCE && bayes.risk_reward >= EXEC_RISK_REWARD && risk < EXEC_ALT_RISK_WIDE {
        return Some("high confidence with favorable risk/reward".to_string());
    }
    if bayes.quality == SignalQuality::Excellent {
        return Some("excellent signal quality".to_string());
    }
    None
}

/// Side implied by flux direction, falling back to order flow.
fn implied_side(flux: &Flux, flow: &OrderFlow) -> TradeSide {
    match flux.direction {
        FluxDirection::Up => TradeSide::Long,
        FluxDirection::Down => TradeSide::Short,
        FluxDirection::Sideways => match flow.direction {
            FlowDirection::Buying => TradeSide::Long,
            FlowDirection::Selling => TradeSide::Short,
            FlowDirection::Neutral => TradeSide::Flat,
        },
    }
}

/// Advisory warnings that never change the action on their own.
fn collect_warnings(
    flux: &Flux,
    flow: &OrderFlow,
    regime: &RegimeRisk,
    momentum: &Momentum,
    side: TradeSide,
) -> Vec<String> {
    let mut warnings = Vec::new();
    if regime.risk_level > WARN_RISK {
        warnings.push(format!("elevated risk level {:.2}", regime.risk_level));
    }
    if momentum.exhaustion {
        warnings.push("momentum exhaustion detected".to_string());
    }
    let against_long = side == TradeSide::Long && momentum.divergence == Divergence::Bearish;
    let against_short = side == TradeSide::Short && momentum.divergence == Divergence::Bullish;
    if against_long || against_short {
        warnings.push(format!(
            "{} divergence against {} side",
            momentum.divergence, side
        ));
    }
    if flux.direction == FluxDirection::Up && flow.direction == FlowDirection::Selling
        || flux.direction == FluxDirection::Down && flow.direction == FlowDirection::Buying
    {
        warnings.push("order flow opposes price flux".to_string());
    }
    warnings
}
