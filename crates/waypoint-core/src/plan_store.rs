//! Typed plan persistence over a `KeyedStore`.

use std::sync::Arc;

use waypoint_contracts::{
    error::{WaypointError, WaypointResult},
    plan::Plan,
};
use waypoint_store::{agent_partition, plan_key, KeyedStore, KeyedStoreExt, PLAN_PREFIX};

/// Plans live in their agent's partition under `plan#<id>`.
#[derive(Clone)]
pub struct PlanStore {
    store: Arc<dyn KeyedStore>,
}

impl PlanStore {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// Insert or replace `plan`.
    pub fn save(&self, plan: &Plan) -> WaypointResult<()> {
        self.store
            .put_json(&agent_partition(&plan.agent_id), &plan_key(&plan.id), plan)
    }

    /// The plan, or `None` if `agent_id` has no plan with that id.
    pub fn get(&self, plan_id: &str, agent_id: &str) -> WaypointResult<Option<Plan>> {
        self.store
            .get_json(&agent_partition(agent_id), &plan_key(plan_id))
    }

    /// Like `get`, but a missing plan is a `NotFound` error.
    pub fn require(&self, plan_id: &str, agent_id: &str) -> WaypointResult<Plan> {
        self.get(plan_id, agent_id)?
            .ok_or_else(|| WaypointError::not_found("plan", plan_id))
    }

    /// All of the agent's plans in creation order.
    pub fn list(&self, agent_id: &str) -> WaypointResult<Vec<Plan>> {
        self.store
            .query_json(&agent_partition(agent_id), Some(PLAN_PREFIX))
    }
}
