//! Keyed records and the per-agent key scheme.
//!
//! Every entity lives in its agent's partition (`agent#<agent_id>`) under a
//! sort key prefixed by its entity type:
//!
//! | Entity | Sort key        |
//! |--------|-----------------|
//! | Plan   | `plan#<id>`     |
//! | Rule   | `rule#<id>`     |
//! | Memory | `memory#<id>`   |

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PLAN_PREFIX: &str = "plan#";
pub const RULE_PREFIX: &str = "rule#";
pub const MEMORY_PREFIX: &str = "memory#";

/// One record in the store: a partition/sort key pair and a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub partition_key: String,
    pub sort_key: String,
    pub body: Value,
}

impl StoredRecord {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>, body: Value) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
            body,
        }
    }
}

pub fn agent_partition(agent_id: &str) -> String {
    format!("agent#{agent_id}")
}

pub fn plan_key(plan_id: &str) -> String {
    format!("{PLAN_PREFIX}{plan_id}")
}

pub fn rule_key(rule_id: &str) -> String {
    format!("{RULE_PREFIX}{rule_id}")
}

pub fn memory_key(memory_id: &str) -> String {
    format!("{MEMORY_PREFIX}{memory_id}")
}
