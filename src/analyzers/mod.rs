// =============================================================================
// Analyzers Module
// =============================================================================
//
// Five independent, pure analyzers over the same immutable candle window
// (most-recent-first). Each returns a freshly allocated snapshot; none holds
// state, so they can run concurrently with no locking:
// - State-probability (three-way market-state distribution)
// - Flux (velocity / acceleration / breakout)
// - Order flow (volume delta, imbalance, whales, A/D)
// - Regime/risk (chaos metrics and classification)
// - Momentum (inflection, divergence, exhaustion)

pub mod flux;
pub mod momentum;
pub mod order_flow;
pub mod regime;
pub mod state_probability;

pub use flux::{Flux, FluxDirection};
pub use momentum::{Divergence, Inflection, Momentum, MomentumDirection};
pub use order_flow::{FlowDirection, OrderFlow};
pub use regime::{MarketRegime, RegimeRisk};
pub use state_probability::{MarketState, StateProbability};
