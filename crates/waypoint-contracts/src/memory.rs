//! Agent memory types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Memory tiers.
///
/// | Kind         | Written by                                   |
/// |--------------|----------------------------------------------|
/// | `ShortTerm`  | API callers, rule `store_memory` actions     |
/// | `LongTerm`   | plan completion, consolidation               |
/// | `Episodic`   | one entry per executed step                  |
/// | `Semantic`   | API callers (distilled facts)                |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    ShortTerm,
    LongTerm,
    Episodic,
    Semantic,
}

impl MemoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::LongTerm => "long_term",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
        }
    }

    /// Parse a kind from its snake_case name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "short_term" => Some(Self::ShortTerm),
            "long_term" => Some(Self::LongTerm),
            "episodic" => Some(Self::Episodic),
            "semantic" => Some(Self::Semantic),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp an importance score into `[0, 1]`. NaN becomes `0.0`.
pub fn clamp_importance(importance: f64) -> f64 {
    if importance.is_nan() {
        0.0
    } else {
        importance.clamp(0.0, 1.0)
    }
}

/// A stored note belonging to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub agent_id: String,
    pub owner_id: String,
    pub kind: MemoryKind,
    pub content: String,
    pub context: Option<Map<String, Value>>,
    /// Always within `[0, 1]`.
    pub importance: f64,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Recorded only; nothing expires a memory automatically.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input to `MemoryStore::store`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMemory {
    pub agent_id: String,
    pub owner_id: String,
    pub content: String,
    pub kind: MemoryKind,
    /// Clamped into `[0, 1]` before it is persisted.
    pub importance: f64,
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
    #[serde(default)]
    pub ttl_days: Option<u32>,
}

impl NewMemory {
    pub fn new(
        agent_id: impl Into<String>,
        owner_id: impl Into<String>,
        content: impl Into<String>,
        kind: MemoryKind,
        importance: f64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            owner_id: owner_id.into(),
            content: content.into(),
            kind,
            importance,
            context: None,
            ttl_days: None,
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_ttl_days(mut self, days: u32) -> Self {
        self.ttl_days = Some(days);
        self
    }
}

/// Filter for `MemoryStore::retrieve`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub agent_id: String,
    pub kind: Option<MemoryKind>,
    pub min_importance: Option<f64>,
    pub limit: Option<usize>,
}

impl MemoryQuery {
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn min_importance(mut self, min: f64) -> Self {
        self.min_importance = Some(min);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Aggregate view over one agent's memories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: usize,
    pub by_kind: BTreeMap<MemoryKind, usize>,
    /// `0.0` when the agent has no memories.
    pub avg_importance: f64,
}

/// Outcome of one consolidation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    /// The long-term memories written, one per group.
    pub created: Vec<Memory>,
    /// Number of short-term memories deleted.
    pub removed: usize,
}
