//! # waypoint-rules
//!
//! Prioritized condition/action rules for Waypoint agents.
//!
//! `RuleEngine` implements `waypoint_core::traits::RuleEvaluator`: the plan
//! executor consults it before every step, and a matched `stop_execution`
//! action cancels the plan before the step runs.
//!
//! Rules are managed per agent (`create_rule`, `update_rule`, `delete_rule`,
//! `toggle_rule`) or seeded from a TOML file of `[[rules]]` tables.

pub mod condition;
pub mod engine;

pub use engine::RuleEngine;

// ── Tests ─────────────────────────────────────────────────────────────────────
