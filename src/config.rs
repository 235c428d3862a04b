// =============================================================================
// Engine Configuration — tunable scoring constants with atomic save
// =============================================================================
//
// The handful of constants that downstream users may want to tune without a
// rebuild live here. Persistence uses an atomic tmp + rename pattern to
// prevent corruption on crash, and every field carries `#[serde(default)]` so
// that adding new fields never breaks loading an older config file.
//
// Everything else in the pipeline is a fixed named constant next to the code
// that uses it — the decision-layer thresholds were tuned against those exact
// values and re-deriving them would silently shift the rule cascade.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_avg_loss_baseline() -> f64 {
    10.0
}

fn default_avg_win_base() -> f64 {
    15.0
}

fn default_avg_win_momentum_bonus() -> f64 {
    5.0
}

fn default_half_kelly() -> bool {
    true
}

fn default_max_position_fraction() -> f64 {
    0.25
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Tunable parameters for the Bayesian aggregation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed average-loss baseline (price units) in the expected-return
    /// formula. NOTE: this is a flat heuristic, not derived from any actual
    /// stop distance — kept as-is because the decision thresholds were tuned
    /// against it.
    #[serde(default = "default_avg_loss_baseline")]
    pub avg_loss_baseline: f64,

    /// Base average win (price units) before the momentum bonus.
    #[serde(default = "default_avg_win_base")]
    pub avg_win_base: f64,

    /// Extra average win per unit of |flux momentum| (momentum is in [-1, 1]).
    #[serde(default = "default_avg_win_momentum_bonus")]
    pub avg_win_momentum_bonus: f64,

    /// Apply the Kelly fraction at half strength.
    #[serde(default = "default_half_kelly")]
    pub half_kelly: bool,

    /// Hard cap on the position-size fraction.
    #[serde(default = "default_max_position_fraction")]
    pub max_position_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            avg_loss_baseline: default_avg_loss_baseline(),
            avg_win_base: default_avg_win_base(),
            avg_win_momentum_bonus: default_avg_win_momentum_bonus(),
            half_kelly: default_half_kelly(),
            max_position_fraction: default_max_position_fraction(),
        }
    }
}

impl EngineConfig {
    /// Load the config from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&raw).context("failed to parse engine config JSON")?;

        info!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Persist the config atomically (write tmp, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).context("failed to serialize engine config")?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            warn!(error = %e, "atomic rename failed, config not saved");
            return Err(e).with_context(|| format!("failed to rename into {}", path.display()));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_baselines() {
        let cfg = EngineConfig::default();
        assert!((cfg.avg_loss_baseline - 10.0).abs() < f64::EPSILON);
        assert!((cfg.avg_win_base - 15.0).abs() < f64::EPSILON);
        assert!((cfg.max_position_fraction - 0.25).abs() < f64::EPSILON);
        assert!(cfg.half_kelly);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"avg_loss_baseline": 12.0}"#).unwrap();
        assert!((cfg.avg_loss_baseline - 12.0).abs() < f64::EPSILON);
        assert!((cfg.avg_win_base - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = EngineConfig::load("/nonexistent/meridian_config.json").unwrap();
        assert!((cfg.avg_loss_baseline - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join("meridian_config_test.json");
        let mut cfg = EngineConfig::default();
        cfg.avg_loss_baseline = 8.5;
        cfg.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert!((loaded.avg_loss_baseline - 8.5).abs() < f64::EPSILON);
        let _ = std::fs::remove_file(&path);
    }
}
