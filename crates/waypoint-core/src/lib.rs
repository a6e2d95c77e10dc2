//! # waypoint-core
//!
//! Plan generation and plan execution for Waypoint agents.
//!
//! A `PlanGenerator` turns a natural-language task into a persisted, pending
//! `Plan`. A `PlanExecutor` walks that plan forward one step at a time:
//!
//! ```text
//! for each step from current_step_index:
//!   cancelled externally?      → stop (cancelled)
//!   dependency not completed?  → skip, advance
//!   rule evaluation says stop? → stop (cancelled), index unchanged
//!   apply rule actions, resolve {{step_N_result}} placeholders
//!   invoke tool / completion   → failure stops the plan (failed)
//!   record result, advance, write an episodic memory
//! all steps done               → completed, long-term memory
//! ```
//!
//! Every collaborator (completion, tools, knowledge, rules, memory, clock)
//! is injected as a trait object from `traits`.

pub mod executor;
pub mod lock;
pub mod plan_store;
pub mod planner;
pub mod router;
pub mod template;
pub mod traits;

pub use executor::PlanExecutor;
pub use plan_store::PlanStore;
pub use planner::PlanGenerator;
pub use traits::{
    Clock, CompletionService, KnowledgeBase, MemoryStore, RuleEvaluator, SystemClock, ToolInvoker,
};
