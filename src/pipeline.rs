// =============================================================================
// Signal Pipeline — fan-out / fan-in over a shared immutable window
// =============================================================================
//
// The five analyzers are pure functions over the same candle slice, so the
// concurrent path shares one `Arc<Vec<Candle>>` across `spawn_blocking` tasks
// and joins them before aggregation. A sequential path exists for callers
// that are already on a blocking thread (and for deterministic tests); both
// paths produce bit-identical output for the same window.
//
// A single gate at the front requires 100 candles. Analyzers re-check their
// own minimums, but with the gate in place those checks can no longer fire,
// so the only error surfaced to callers is `InsufficientData`.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzers::{
    flux, momentum, order_flow, regime, state_probability, Flux, Momentum, OrderFlow, RegimeRisk,
    StateProbability,
};
use crate::bayes::{self, BayesianResult};
use crate::config::EngineConfig;
use crate::decision::{self, TradeDecision};
use crate::error::{EngineError, Stage};
use crate::market_data::Candle;

/// Minimum window length for a full evaluation; the largest analyzer minimum.
pub const MIN_WINDOW: usize = 100;

/// Everything one evaluation produced, analyzer snapshots included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub state: StateProbability,
    pub flux: Flux,
    pub order_flow: OrderFlow,
    pub regime: RegimeRisk,
    pub momentum: Momentum,
    pub bayes: BayesianResult,
    pub decision: TradeDecision,
    /// Close of the most recent candle in the evaluated window.
    pub last_close: f64,
    pub candles: usize,
}

/// Sequential evaluation of a most-recent-first candle window.
pub fn evaluate_window(config: &EngineConfig, window: &[Candle]) -> Result<Evaluation, EngineError> {
    if window.len() < MIN_WINDOW {
        return Err(EngineError::insufficient(
            Stage::Pipeline,
            MIN_WINDOW,
            window.len(),
        ));
    }

    let state = state_probability::analyze(window)?;
    let flux = flux::analyze(window)?;
    let order_flow = order_flow::analyze(window)?;
    let regime = regime::analyze(window)?;
    let momentum = momentum::analyze(window)?;

    Ok(finalize(
        config, window, state, flux, order_flow, regime, momentum,
    ))
}

/// Concurrent evaluation: one blocking task per analyzer over a shared window.
pub async fn evaluate_window_concurrent(
    config: &EngineConfig,
    window: Arc<Vec<Candle>>,
) -> Result<Evaluation, EngineError> {
    if window.len() < MIN_WINDOW {
        return Err(EngineError::insufficient(
            Stage::Pipeline,
            MIN_WINDOW,
            window.len(),
        ));
    }

    let w1 = Arc::clone(&window);
    let w2 = Arc::clone(&window);
    let w3 = Arc::clone(&window);
    let w4 = Arc::clone(&window);
    let w5 = Arc::clone(&window);

    let (state, flux, order_flow, regime, momentum) = tokio::try_join!(
        spawn_analyzer(move || state_probability::analyze(&w1)),
        spawn_analyzer(move || flux::analyze(&w2)),
        spawn_analyzer(move || order_flow::analyze(&w3)),
        spawn_analyzer(move || regime::analyze(&w4)),
        spawn_analyzer(move || momentum::analyze(&w5)),
    )?;

    Ok(finalize(
        config, &window, state, flux, order_flow, regime, momentum,
    ))
}

/// Run one analyzer on the blocking pool, flattening the join error.
async fn spawn_analyzer<T, F>(f: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::Task(e.to_string()))?
}

/// Shared tail of both paths: aggregation and the final decision.
fn finalize(
    config: &EngineConfig,
    window: &[Candle],
    state: StateProbability,
    flux: Flux,
    order_flow: OrderFlow,
    regime: RegimeRisk,
    momentum: Momentum,
) -> Evaluation {
    let bayes = bayes::aggregate(config, &state, &flux, &order_flow, &regime);
    let decision = decision::decide(&state, &flux, &order_flow, &regime, &momentum, &bayes);

    info!(
        action = %decision.action,
        side = %decision.side,
        posterior = format!("{:.3}", bayes.posterior),
        regime = %regime.regime,
        candles = window.len(),
        "window evaluated"
    );

    Evaluation {
        last_close: window[0].close,
        candles: window.len(),
        state,
        flux,
        order_flow,
        regime,
        momentum,
        bayes,
        decision,
    }
}

/// Engine wrapper that keeps the most recent evaluation for readers.
pub struct SignalEngine {
    config: EngineConfig,
    last: parking_lot::RwLock<Option<(chrono::DateTime<Utc>, Evaluation)>>,
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            last: parking_lot::RwLock::new(None),
        }
    }

    /// Evaluate a window concurrently and cache the result.
    pub async fn evaluate(&self, window: Arc<Vec<Candle>>) -> Result<Evaluation, EngineError> {
        let evaluation = evaluate_window_concurrent(&self.config, window).await?;
        *self.last.write() = Some((Utc::now(), evaluation.clone()));
        debug!(action = %evaluation.decision.action, "evaluation cached");
        Ok(evaluation)
    }

    /// Most recent evaluation, if any, with its wall-clock timestamp.
    pub fn last_evaluation(&self) -> Option<(chrono::DateTime<Utc>, Evaluation)> {
        self.last.read().clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    // Deterministic pseudo-random walk, newest candle first.
    fn walk_window(seed: u64, n: usize) -> Vec<Candle> {
        let mut state = seed;
        let mut rand = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 1000) as f64 / 1000.0
        };
        let mut price = 50_000.0_f64;
        let mut oldest_first = Vec::with_capacity(n);
        for i in 0..n {
            let drift = (rand() - 0.5) * 120.0;
            let open = price;
            let close = price + drift;
            let high = open.max(close) + rand() * 30.0;
            let low = open.min(close) - rand() * 30.0;
            oldest_first.push(Candle {
                open_time: 1_700_000_000_000 + i as i64 * 60_000,
                open,
                high,
                low,
                close,
                volume: 40.0 + rand() * 400.0,
            });
            price = close;
        }
        oldest_first.reverse();
        oldest_first
    }

    #[test]
    fn short_window_fails_at_the_gate() {
        let config = EngineConfig::default();
        let window = walk_window(7, 99);
        let err = evaluate_window(&config, &window).unwrap_err();
        match err {
            EngineError::InsufficientData {
                stage,
                required,
                got,
            } => {
                assert_eq!(stage, Stage::Pipeline);
                assert_eq!(required, MIN_WINDOW);
                assert_eq!(got, 99);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sequential_evaluation_is_deterministic() {
        let config = EngineConfig::default();
        let window = walk_window(42, 150);
        let a = evaluate_window(&config, &window).unwrap();
        let b = evaluate_window(&config, &window).unwrap();
        assert_eq!(
            a.bayes.posterior.to_bits(),
            b.bayes.posterior.to_bits()
        );
        assert_eq!(a.decision.action, b.decision.action);
        assert_eq!(
            a.decision.confidence.to_bits(),
            b.decision.confidence.to_bits()
        );
    }

    #[tokio::test]
    async fn concurrent_matches_sequential() {
        let config = EngineConfig::default();
        let window = walk_window(99, 200);
        let sequential = evaluate_window(&config, &window).unwrap();
        let concurrent = evaluate_window_concurrent(&config, Arc::new(window))
            .await
            .unwrap();
        assert_eq!(
            sequential.bayes.posterior.to_bits(),
            concurrent.bayes.posterior.to_bits()
        );
        assert_eq!(sequential.decision.action, concurrent.decision.action);
        assert_eq!(sequential.decision.reasons, concurrent.decision.reasons);
        assert_eq!(sequential.regime.regime, concurrent.regime.regime);
    }

    #[tokio::test]
    async fn engine_caches_last_evaluation() {
        let engine = SignalEngine::new(EngineConfig::default());
        assert!(engine.last_evaluation().is_none());
        let window = Arc::new(walk_window(5, 120));
        let evaluation = engine.evaluate(window).await.unwrap();
        let (_, cached) = engine.last_evaluation().unwrap();
        assert_eq!(cached.decision.action, evaluation.decision.action);
        assert_eq!(cached.candles, 120);
    }

    #[tokio::test]
    async fn concurrent_short_window_fails_at_the_gate() {
        let config = EngineConfig::default();
        let window = Arc::new(walk_window(3, 50));
        let err = evaluate_window_concurrent(&config, window).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData {
                stage: Stage::Pipeline,
                ..
            }
        ));
    }

    #[test]
    fn evaluation_serializes_to_json() {
        let config = EngineConfig::default();
        let window = walk_window(11, 140);
        let evaluation = evaluate_window(&config, &window).unwrap();
        let json = serde_json::to_string(&evaluation).unwrap();
        assert!(json.contains("posterior"));
        assert!(json.contains("action"));
    }
}
