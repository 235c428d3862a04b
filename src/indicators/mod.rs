// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free primitives backing the momentum/divergence engine.
// Every public entry point returns `Option`/empty collections on insufficient
// data so callers are forced to handle the short-history case.

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdResult};
pub use rsi::{oscillator_current, oscillator_series, OSCILLATOR_PERIOD};
