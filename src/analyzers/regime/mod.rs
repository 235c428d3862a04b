// =============================================================================
// Regime/Risk Module
// =============================================================================
//
// Chaos and fractal metrics over the candle window:
// - Sensitivity exponent (Lyapunov-style trajectory divergence)
// - Fractal dimension (box counting)
// - Return-distribution entropy
// - Persistence exponent (R/S analysis)
// plus the regime classification and scalar risk level built from them.

pub mod engine;
pub mod entropy;
pub mod fractal;
pub mod hurst;

pub use engine::{analyze, MarketRegime, RegimeRisk, ANNUALIZATION_FACTOR, MIN_CANDLES};
pub use entropy::return_entropy;
pub use fractal::{fractal_dimension, sensitivity_exponent};
pub use hurst::persistence_exponent;
