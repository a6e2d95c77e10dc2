//! Runtime configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! [planner]
//! model = "gpt-4o-mini"
//! memory_limit = 10
//!
//! [memory]
//! tie_band = 0.1
//! consolidation_window_minutes = 60
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{WaypointError, WaypointResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypointConfig {
    pub planner: PlannerConfig,
    pub executor: ExecutorConfig,
    pub memory: MemoryConfig,
}

impl WaypointConfig {
    /// Parse `s` as a TOML configuration document.
    pub fn from_toml_str(s: &str) -> WaypointResult<Self> {
        toml::from_str(s).map_err(|e| WaypointError::Config {
            reason: format!("failed to parse config TOML: {}", e),
        })
    }

    /// Read and parse the TOML configuration file at `path`.
    pub fn from_file(path: &Path) -> WaypointResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WaypointError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Settings for drafting plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub model: String,
    pub temperature: f64,
    /// Maximum memories offered to the drafting model.
    pub memory_limit: usize,
    pub memory_min_importance: f64,
    /// Maximum knowledge-base excerpts offered to the drafting model.
    pub knowledge_limit: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            memory_limit: 10,
            memory_min_importance: 0.5,
            knowledge_limit: 5,
        }
    }
}

/// Settings for running plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Model used for `llm` steps.
    pub model: String,
    pub temperature: f64,
    /// Importance of the episodic memory written after each step.
    pub step_memory_importance: f64,
    /// Importance of the long-term memory written when a plan completes.
    pub completion_memory_importance: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            step_memory_importance: 0.6,
            completion_memory_importance: 0.8,
        }
    }
}

/// Settings for retrieval ordering and consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Importances closer than this are ranked by recency instead.
    pub tie_band: f64,
    /// Consecutive short-term memories closer than this are merged together.
    pub consolidation_window_minutes: i64,
    pub consolidation_min_importance: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            tie_band: 0.1,
            consolidation_window_minutes: 60,
            consolidation_min_importance: 0.7,
        }
    }
}
