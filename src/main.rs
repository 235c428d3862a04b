// =============================================================================
// Meridian Signal Engine — Main Entry Point
// =============================================================================
//
// Loads a candle window from a JSON file (most-recent-first), runs the full
// analyzer pipeline concurrently, and prints the audit record as pretty JSON.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analyzers;
mod audit;
mod bayes;
mod config;
mod decision;
mod error;
mod indicators;
mod market_data;
mod pipeline;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::audit::DecisionRecord;
use crate::config::EngineConfig;
use crate::pipeline::SignalEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Meridian Signal Engine — Starting Up             ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("MERIDIAN_CONFIG").unwrap_or_else(|_| "engine_config.json".into());
    let config = EngineConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });
    info!(
        path = %config_path,
        half_kelly = config.half_kelly,
        max_position = config.max_position_fraction,
        "Configuration loaded"
    );

    // ── 2. Load the candle window ────────────────────────────────────────
    let candle_path = std::env::args()
        .nth(1)
        .context("usage: meridian-engine <candles.json>")?;
    let window = market_data::candle::load_window(&candle_path)?;
    info!(path = %candle_path, candles = window.len(), "Candle window loaded");

    // ── 3. Evaluate ──────────────────────────────────────────────────────
    let engine = SignalEngine::new(config);
    let evaluation = engine.evaluate(Arc::new(window)).await?;

    info!(
        action = %evaluation.decision.action,
        side = %evaluation.decision.side,
        posterior = format!("{:.3}", evaluation.bayes.posterior),
        position = format!("{:.4}", evaluation.decision.position_size),
        "Evaluation complete"
    );

    // ── 4. Emit the audit record ─────────────────────────────────────────
    let record = DecisionRecord::from_evaluation(&evaluation);
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(())
}
