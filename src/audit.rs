// =============================================================================
// Decision audit record
// =============================================================================
//
// A self-contained, serializable record of one evaluation: the decision plus
// the key figure from each upstream stage. Records are what gets logged,
// persisted, or shipped to a downstream consumer; they carry everything
// needed to reconstruct why the engine acted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::{TradeAction, TradeDecision, TradeSide};
use crate::pipeline::Evaluation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub action: TradeAction,
    pub side: TradeSide,
    pub reasons: Vec<String>,
    pub position_size: f64,
    pub confidence: f64,
    pub quality_score: f64,
    pub warnings: Vec<String>,
    /// Key figure per upstream stage.
    pub dominant_state: String,
    pub state_probability: f64,
    pub flux_direction: String,
    pub breakout_probability: f64,
    pub flow_direction: String,
    pub whale_count: usize,
    pub regime: String,
    pub risk_level: f64,
    pub momentum_direction: String,
    pub momentum_strength: f64,
    pub posterior: f64,
    pub risk_reward: f64,
    pub expected_return: f64,
    pub last_close: f64,
    pub candles: usize,
}

impl DecisionRecord {
    /// Snapshot an evaluation into an audit record with a fresh id.
    pub fn from_evaluation(evaluation: &Evaluation) -> Self {
        let d: &TradeDecision = &evaluation.decision;
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            action: d.action,
            side: d.side,
            reasons: d.reasons.clone(),
            position_size: d.position_size,
            confidence: d.confidence,
            quality_score: d.quality_score,
            warnings: d.warnings.clone(),
            dominant_state: evaluation.state.dominant.to_string(),
            state_probability: evaluation.state.dominant_probability(),
            flux_direction: evaluation.flux.direction.to_string(),
            breakout_probability: evaluation.flux.breakout_probability,
            flow_direction: evaluation.order_flow.direction.to_string(),
            whale_count: evaluation.order_flow.whale_count,
            regime: evaluation.regime.regime.to_string(),
            risk_level: evaluation.regime.risk_level,
            momentum_direction: evaluation.momentum.direction.to_string(),
            momentum_strength: evaluation.momentum.strength,
            posterior: evaluation.bayes.posterior,
            risk_reward: evaluation.bayes.risk_reward,
            expected_return: evaluation.bayes.expected_return,
            last_close: evaluation.last_close,
            candles: evaluation.candles,
        }
    }
}
