//! Configuration for the BRAINZ arbitration engine.
//!
//! Maps directly to `brainz.toml`. Every field has a default, so an empty
//! document is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level BRAINZ configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrainzConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Per-agent decision loop tuning.
    #[serde(default)]
    pub arbiter: ArbiterConfig,
    /// Per-agent memory limits and consolidation.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Interactable search and rescans.
    #[serde(default)]
    pub sensing: SensingConfig,
    /// Performance budget monitoring.
    #[serde(default)]
    pub performance: PerformanceConfig,
}

impl BrainzConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `BrainzError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::BrainzError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Seed for every random stream in the world (jitter, weight noise, tie-breaks).
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            log_level: "info".to_string(),
        }
    }
}

/// Decision loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// Seconds between arbitration passes for one agent.
    #[serde(default = "default_0_5")]
    pub decision_interval_secs: f32,
    /// ± fraction of the interval added as jitter to desynchronize agents.
    #[serde(default = "default_0_2")]
    pub jitter_pct: f32,
    /// Multiplier applied to the weight of a prioritized behavior.
    #[serde(default = "default_10_0")]
    pub prioritized_boost: f32,
    /// Weight kept by a running, non-interruptible behavior.
    #[serde(default = "default_1_0")]
    pub running_floor_weight: f32,
    /// Seconds a behavior may wait to reach its interactable before giving up.
    #[serde(default = "default_30_0")]
    pub approach_timeout_secs: f32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            decision_interval_secs: 0.5,
            jitter_pct: 0.2,
            prioritized_boost: 10.0,
            running_floor_weight: 1.0,
            approach_timeout_secs: 30.0,
        }
    }
}

/// Per-agent memory capacity and consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Short-term (mergeable) memory cap.
    #[serde(default = "default_20")]
    pub short_term_capacity: usize,
    /// Long-term (consolidated) memory cap.
    #[serde(default = "default_40")]
    pub long_term_capacity: usize,
    /// Summed |influence| at which a short-term group is promoted.
    #[serde(default = "default_100_0")]
    pub promotion_threshold: f32,
    /// Radius under which two subject-less memories count as the same place.
    #[serde(default = "default_1_5")]
    pub similarity_radius: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: 20,
            long_term_capacity: 40,
            promotion_threshold: 100.0,
            similarity_radius: 1.5,
        }
    }
}

/// Interactable discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensingConfig {
    /// Distance an agent must move before its nearby-interactable cache is refreshed.
    #[serde(default = "default_2_0")]
    pub rescan_distance: f32,
    /// Radius searched when a behavior does not set its own.
    #[serde(default = "default_25_0")]
    pub interactable_search_radius: f32,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            rescan_distance: 2.0,
            interactable_search_radius: 25.0,
        }
    }
}

/// Performance budget monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Budget for one world tick in milliseconds.
    #[serde(default = "default_2_0")]
    pub tick_budget_ms: f32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { tick_budget_ms: 2.0 }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_seed() -> u64 { 0x5EED }
fn default_log_level() -> String { "info".to_string() }
fn default_0_2() -> f32 { 0.2 }
fn default_0_5() -> f32 { 0.5 }
fn default_1_0() -> f32 { 1.0 }
fn default_1_5() -> f32 { 1.5 }
fn default_2_0() -> f32 { 2.0 }
fn default_10_0() -> f32 { 10.0 }
fn default_25_0() -> f32 { 25.0 }
fn default_30_0() -> f32 { 30.0 }
fn default_100_0() -> f32 { 100.0 }
fn default_20() -> usize { 20 }
fn default_40() -> usize { 40 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = BrainzConfig::from_toml("").expect("empty toml is valid");
        assert_eq!(config.memory.short_term_capacity, 20);
        assert!((config.arbiter.prioritized_boost - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = BrainzConfig::from_toml(
            "[memory]\npromotion_threshold = 50.0\n\n[arbiter]\njitter_pct = 0.0\n",
        )
        .expect("valid toml");
        assert!((config.memory.promotion_threshold - 50.0).abs() < f32::EPSILON);
        assert_eq!(config.memory.long_term_capacity, 40);
        assert_eq!(config.arbiter.jitter_pct, 0.0);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = BrainzConfig::from_toml("[memory\n").unwrap_err();
        assert!(matches!(err, crate::BrainzError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("brainz.toml");
        std::fs::write(&path, "[general]\nseed = 7\n").expect("write config");
        let config = BrainzConfig::from_file(&path).expect("load config");
        assert_eq!(config.general.seed, 7);
    }
}
