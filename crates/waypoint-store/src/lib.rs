//! # waypoint-store
//!
//! The partition/sort keyed store every Waypoint component persists through.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waypoint_store::{agent_partition, plan_key, InMemoryKeyedStore, KeyedStoreExt};
//!
//! let store = InMemoryKeyedStore::new();
//! store.put_json(&agent_partition("agent-1"), &plan_key(&plan.id), &plan)?;
//! let plans: Vec<Plan> = store.query_json(&agent_partition("agent-1"), Some(PLAN_PREFIX))?;
//! ```

pub mod memory;
pub mod record;
pub mod traits;

pub use memory::InMemoryKeyedStore;
pub use record::{
    agent_partition, memory_key, plan_key, rule_key, StoredRecord, MEMORY_PREFIX, PLAN_PREFIX,
    RULE_PREFIX,
};
pub use traits::{KeyedStore, KeyedStoreExt};

// ── Tests ─────────────────────────────────────────────────────────────────────
