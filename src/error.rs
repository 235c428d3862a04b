// =============================================================================
// Engine error taxonomy
// =============================================================================
//
// In practice one condition aborts a pipeline run: a candle window shorter
// than a stage's minimum. (`Task` covers a cancelled or panicked analyzer
// task on the concurrent path, which a correct analyzer never produces.)
// Degenerate-but-sufficient input (zero-range candles, flat
// price series, zero denominators) is recovered inside each analyzer with a
// documented neutral default, and extreme values are clamped into each field's
// range — neither ever surfaces as an error.

use thiserror::Error;

/// The pipeline stage that reported a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pipeline,
    StateProbability,
    Flux,
    OrderFlow,
    RegimeRisk,
    Momentum,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pipeline => write!(f, "pipeline"),
            Self::StateProbability => write!(f, "state-probability"),
            Self::Flux => write!(f, "flux"),
            Self::OrderFlow => write!(f, "order-flow"),
            Self::RegimeRisk => write!(f, "regime-risk"),
            Self::Momentum => write!(f, "momentum"),
        }
    }
}

/// Caller-visible failures of the scoring pipeline.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// The candle window is shorter than the stage's minimum history.
    #[error("{stage} stage needs at least {required} candles, got {got}")]
    InsufficientData {
        stage: Stage,
        required: usize,
        got: usize,
    },

    /// A spawned analyzer task was cancelled or panicked.
    #[error("analyzer task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// Shorthand used by every analyzer's length gate.
    pub fn insufficient(stage: Stage, required: usize, got: usize) -> Self {
        Self::InsufficientData {
            stage,
            required,
            got,
        }
    }
}
