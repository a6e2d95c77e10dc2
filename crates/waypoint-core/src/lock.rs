//! Advisory per-plan execution locks.
//!
//! Two executions of the same plan would race on `current_step_index`, so
//! `PlanExecutor::execute_plan` holds a `PlanLockGuard` for its whole run.
//! The lock is process-local and keyed by plan id. Exclusion only holds
//! between holders of the same `PlanLocks` table; clones share it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::warn;

use waypoint_contracts::error::{WaypointError, WaypointResult};

#[derive(Debug, Clone, Default)]
pub struct PlanLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl PlanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `plan_id`, or fail with `Conflict` if it is held.
    pub fn acquire(&self, plan_id: &str) -> WaypointResult<PlanLockGuard> {
        let mut held = self.held.lock().map_err(|e| WaypointError::Persistence {
            reason: format!("plan lock table poisoned: {}", e),
        })?;

        if !held.insert(plan_id.to_string()) {
            warn!(plan_id = %plan_id, "plan is already executing");
            return Err(WaypointError::Conflict {
                reason: format!("plan '{}' is already executing", plan_id),
            });
        }

        Ok(PlanLockGuard {
            held: Arc::clone(&self.held),
            plan_id: plan_id.to_string(),
        })
    }

    pub fn is_held(&self, plan_id: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(plan_id))
            .unwrap_or(false)
    }
}

/// Releases its plan's lock when dropped.
#[derive(Debug)]
pub struct PlanLockGuard {
    held: Arc<Mutex<HashSet<String>>>,
    plan_id: String,
}

impl Drop for PlanLockGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.plan_id);
        }
    }
}
