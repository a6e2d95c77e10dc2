//! Collaborator traits for the Waypoint orchestration core.
//!
//! The planner and executor only ever talk to these seams:
//!
//! - `CompletionService`: untrusted text generation (an LLM or equivalent)
//! - `ToolInvoker`: every concrete integration (mail, calendar, chat…)
//! - `KnowledgeBase`: optional excerpt retrieval for planning
//! - `RuleEvaluator`: the guardrail gate consulted before every step
//! - `MemoryStore`: durable agent experience
//! - `Clock`: wall-clock time, injectable for tests
//!
//! All calls are blocking. A plan's steps run one after another and every
//! collaborator call completes before the next step is considered.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use waypoint_contracts::{
    context::{CompletionRequest, EvaluationContext},
    error::WaypointResult,
    memory::{ConsolidationReport, Memory, MemoryQuery, MemoryStats, NewMemory},
    rule::RuleEvaluation,
};

/// Text generation used to draft plans and to run `llm` steps.
pub trait CompletionService: Send + Sync {
    /// Return the model's reply to `request`.
    fn complete(&self, request: &CompletionRequest) -> WaypointResult<String>;
}

/// The tool execution service.
///
/// The core passes `params` through untouched and never inspects the shape
/// of the returned value.
pub trait ToolInvoker: Send + Sync {
    /// Run `action` on `tool`. Any error fails the step that asked for it.
    fn invoke(&self, tool: &str, action: &str, params: &Map<String, Value>) -> WaypointResult<Value>;
}

/// Knowledge-base excerpt retrieval offered to the plan drafter.
pub trait KnowledgeBase: Send + Sync {
    /// Up to `limit` text excerpts relevant to `query` from the given bases.
    fn search(
        &self,
        knowledge_base_ids: &[String],
        query: &str,
        limit: usize,
    ) -> WaypointResult<Vec<String>>;
}

/// The rule gate consulted before every step.
///
/// Implementations must not have side effects: they read the agent's rules
/// and aggregate what matched. Applying the returned actions is the caller's
/// job.
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, ctx: &EvaluationContext) -> WaypointResult<RuleEvaluation>;
}

/// Durable, importance-weighted agent memory.
pub trait MemoryStore: Send + Sync {
    /// Persist a new memory. Importance is clamped into `[0, 1]`.
    fn store(&self, memory: NewMemory) -> WaypointResult<Memory>;

    /// Importance-ranked retrieval. Every returned memory is touched
    /// (`access_count + 1`, `last_accessed_at = now`) before it is returned.
    fn retrieve(&self, query: &MemoryQuery) -> WaypointResult<Vec<Memory>>;

    /// Merge time-adjacent important short-term memories into long-term ones.
    fn consolidate(&self, agent_id: &str, owner_id: &str) -> WaypointResult<ConsolidationReport>;

    fn get_stats(&self, agent_id: &str) -> WaypointResult<MemoryStats>;

    /// Fails with `NotFound` when the agent has no such memory.
    fn delete_memory(&self, agent_id: &str, memory_id: &str) -> WaypointResult<()>;
}

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
