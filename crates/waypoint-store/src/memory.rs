//! In-memory implementation of `KeyedStore`.
//!
//! `InMemoryKeyedStore` keeps every partition as an insertion-ordered `Vec`
//! behind a `Mutex`. Cloning the store clones the `Arc`, so the planner,
//! executor, rule engine, and memory store can all share one instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use waypoint_contracts::error::{WaypointError, WaypointResult};

use crate::{record::StoredRecord, traits::KeyedStore};

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct InMemoryState {
    /// Records per partition key, in first-insertion order.
    pub(crate) partitions: HashMap<String, Vec<StoredRecord>>,
}

// ── Public store ──────────────────────────────────────────────────────────────

/// A process-local keyed store.
///
/// # Thread safety
///
/// Every call acquires the internal `Mutex` once. Calls are atomic with
/// respect to each other but there are no multi-call transactions.
#[derive(Clone, Default)]
pub struct InMemoryKeyedStore {
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryKeyedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all partitions.
    pub fn record_count(&self) -> usize {
        self.lock()
            .map(|state| state.partitions.values().map(Vec::len).sum::<usize>())
            .unwrap_or(0)
    }

    fn lock(&self) -> WaypointResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| WaypointError::Persistence {
            reason: format!("store state lock poisoned: {}", e),
        })
    }
}

// ── KeyedStore impl ───────────────────────────────────────────────────────────

impl KeyedStore for InMemoryKeyedStore {
    fn get(&self, partition_key: &str, sort_key: &str) -> WaypointResult<Option<StoredRecord>> {
        let state = self.lock()?;
        Ok(state
            .partitions
            .get(partition_key)
            .and_then(|records| records.iter().find(|r| r.sort_key == sort_key))
            .cloned())
    }

    /// Replacing an existing key keeps the record's original position.
    fn put(&self, record: StoredRecord) -> WaypointResult<()> {
        let mut state = self.lock()?;
        let records = state
            .partitions
            .entry(record.partition_key.clone())
            .or_default();

        match records.iter_mut().find(|r| r.sort_key == record.sort_key) {
            Some(existing) => *existing = record,
            None => {
                debug!(
                    partition = %record.partition_key,
                    sort_key = %record.sort_key,
                    "record inserted"
                );
                records.push(record);
            }
        }
        Ok(())
    }

    fn query(
        &self,
        partition_key: &str,
        sort_prefix: Option<&str>,
    ) -> WaypointResult<Vec<StoredRecord>> {
        let state = self.lock()?;
        let Some(records) = state.partitions.get(partition_key) else {
            return Ok(Vec::new());
        };

        Ok(records
            .iter()
            .filter(|r| sort_prefix.map_or(true, |p| r.sort_key.starts_with(p)))
            .cloned()
            .collect())
    }

    fn update(&self, record: StoredRecord) -> WaypointResult<()> {
        let mut state = self.lock()?;
        let existing = state
            .partitions
            .get_mut(&record.partition_key)
            .and_then(|records| records.iter_mut().find(|r| r.sort_key == record.sort_key));

        match existing {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(WaypointError::not_found(
                "record",
                format!("{}/{}", record.partition_key, record.sort_key),
            )),
        }
    }

    fn delete(&self, partition_key: &str, sort_key: &str) -> WaypointResult<bool> {
        let mut state = self.lock()?;
        let Some(records) = state.partitions.get_mut(partition_key) else {
            return Ok(false);
        };

        let before = records.len();
        records.retain(|r| r.sort_key != sort_key);
        let removed = records.len() < before;
        if removed {
            debug!(partition = %partition_key, sort_key = %sort_key, "record deleted");
        }
        Ok(removed)
    }
}
