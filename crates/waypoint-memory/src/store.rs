//! `MemoryStore` over a `KeyedStore`.
//!
//! Memories live in their agent's partition under `memory#<id>`. Retrieval
//! writes back: every memory it returns has its access counter bumped and
//! its `last_accessed_at` moved to now, in storage and in the result.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use waypoint_contracts::{
    config::MemoryConfig,
    error::{WaypointError, WaypointResult},
    memory::{
        clamp_importance, ConsolidationReport, Memory, MemoryKind, MemoryQuery, MemoryStats,
        NewMemory,
    },
};
use waypoint_core::traits::{Clock, MemoryStore, SystemClock};
use waypoint_store::{agent_partition, memory_key, KeyedStore, KeyedStoreExt, MEMORY_PREFIX};

use crate::ranking::{rank, time_groups};

pub struct KeyedMemoryStore {
    records: Arc<dyn KeyedStore>,
    config: MemoryConfig,
    clock: Arc<dyn Clock>,
}

impl KeyedMemoryStore {
    pub fn new(store: Arc<dyn KeyedStore>, config: MemoryConfig) -> Self {
        Self {
            records: store,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Look up one memory without touching it.
    pub fn get_memory(&self, agent_id: &str, memory_id: &str) -> WaypointResult<Option<Memory>> {
        self.records
            .get_json(&agent_partition(agent_id), &memory_key(memory_id))
    }

    /// Delete every memory whose `expires_at` has passed. Returns how many
    /// were removed. Nothing calls this implicitly.
    pub fn prune_expired(&self, agent_id: &str) -> WaypointResult<usize> {
        let now = self.clock.now();
        let partition = agent_partition(agent_id);
        let mut removed = 0;

        for memory in self.all(agent_id)? {
            if memory.expires_at.is_some_and(|at| at <= now)
                && self.records.delete(&partition, &memory_key(&memory.id))?
            {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(agent_id = %agent_id, removed, "pruned expired memories");
        }
        Ok(removed)
    }

    fn all(&self, agent_id: &str) -> WaypointResult<Vec<Memory>> {
        self.records
            .query_json(&agent_partition(agent_id), Some(MEMORY_PREFIX))
    }
}

/// `now + days`, or a `Validation` error past the representable range.
fn expiry(now: DateTime<Utc>, days: u32) -> WaypointResult<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| WaypointError::validation(format!("ttl_days {} is out of range", days)))
}

impl MemoryStore for KeyedMemoryStore {
    fn store(&self, memory: NewMemory) -> WaypointResult<Memory> {
        let now = self.clock.now();
        let expires_at = match memory.ttl_days {
            Some(days) => Some(expiry(now, days)?),
            None => None,
        };
        let stored = Memory {
            id: Uuid::new_v4().to_string(),
            agent_id: memory.agent_id,
            owner_id: memory.owner_id,
            kind: memory.kind,
            content: memory.content,
            context: memory.context,
            importance: clamp_importance(memory.importance),
            access_count: 0,
            last_accessed_at: now,
            created_at: now,
            expires_at,
        };

        self.records.put_json(
            &agent_partition(&stored.agent_id),
            &memory_key(&stored.id),
            &stored,
        )?;
        debug!(
            memory_id = %stored.id,
            agent_id = %stored.agent_id,
            kind = %stored.kind,
            importance = stored.importance,
            "memory stored"
        );
        Ok(stored)
    }

    fn retrieve(&self, query: &MemoryQuery) -> WaypointResult<Vec<Memory>> {
        let mut memories: Vec<Memory> = self
            .all(&query.agent_id)?
            .into_iter()
            .filter(|m| query.kind.map_or(true, |k| m.kind == k))
            .filter(|m| query.min_importance.map_or(true, |min| m.importance >= min))
            .collect();

        rank(&mut memories, self.config.tie_band);
        if let Some(limit) = query.limit {
            memories.truncate(limit);
        }

        let now = self.clock.now();
        let partition = agent_partition(&query.agent_id);
        for memory in &mut memories {
            memory.access_count += 1;
            memory.last_accessed_at = now;
            self.records
                .update_json(&partition, &memory_key(&memory.id), &*memory)?;
        }

        debug!(agent_id = %query.agent_id, returned = memories.len(), "memories retrieved");
        Ok(memories)
    }

    fn consolidate(&self, agent_id: &str, owner_id: &str) -> WaypointResult<ConsolidationReport> {
        let mut candidates: Vec<Memory> = self
            .all(agent_id)?
            .into_iter()
            .filter(|m| {
                m.kind == MemoryKind::ShortTerm
                    && m.importance >= self.config.consolidation_min_importance
            })
            .collect();
        candidates.sort_by_key(|m| m.created_at);

        let window = Duration::minutes(self.config.consolidation_window_minutes);
        let partition = agent_partition(agent_id);
        let mut report = ConsolidationReport::default();

        for group in time_groups(candidates, window) {
            let ids: Vec<String> = group.iter().map(|m| m.id.clone()).collect();
            let content = group
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join(". ");
            let importance =
                group.iter().map(|m| m.importance).sum::<f64>() / group.len() as f64;

            let mut context = Map::new();
            context.insert("consolidated_from".to_string(), json!(ids));

            let merged = self.store(
                NewMemory::new(agent_id, owner_id, content, MemoryKind::LongTerm, importance)
                    .with_context(context),
            )?;

            // Sources go only once the merged memory is safely written.
            for id in &ids {
                if self.records.delete(&partition, &memory_key(id))? {
                    report.removed += 1;
                } else {
                    warn!(memory_id = %id, "source memory vanished during consolidation");
                }
            }
            report.created.push(merged);
        }

        info!(
            agent_id = %agent_id,
            created = report.created.len(),
            removed = report.removed,
            "memories consolidated"
        );
        Ok(report)
    }

    fn get_stats(&self, agent_id: &str) -> WaypointResult<MemoryStats> {
        let memories = self.all(agent_id)?;
        let mut stats = MemoryStats {
            total: memories.len(),
            ..MemoryStats::default()
        };

        for memory in &memories {
            *stats.by_kind.entry(memory.kind).or_insert(0) += 1;
        }
        if !memories.is_empty() {
            stats.avg_importance =
                memories.iter().map(|m| m.importance).sum::<f64>() / memories.len() as f64;
        }

        Ok(stats)
    }

    fn delete_memory(&self, agent_id: &str, memory_id: &str) -> WaypointResult<()> {
        if self.records.delete(&agent_partition(agent_id), &memory_key(memory_id))? {
            debug!(memory_id = %memory_id, agent_id = %agent_id, "memory deleted");
            Ok(())
        } else {
            Err(WaypointError::not_found("memory", memory_id))
        }
    }
}

/// The `context.consolidated_from` ids of a consolidated memory.
pub fn consolidated_from(memory: &Memory) -> Vec<String> {
    memory
        .context
        .as_ref()
        .and_then(|c| c.get("consolidated_from"))
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
