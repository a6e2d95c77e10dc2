//! # waypoint-ref-assistant
//!
//! Personal-assistant reference runtime for the Waypoint orchestration core.
//!
//! Demonstrates four scenarios using mock tools and a scripted model:
//!
//! 1. **Morning Digest**: a four-step plan with placeholders, rule-driven
//!    context updates and per-step memories, run to completion.
//! 2. **Partner Mail Guardrail**: a `stop_execution` rule cancels the plan
//!    before an email to a partner domain is sent.
//! 3. **Calendar Outage**: a failing tool fails the plan and the remaining
//!    steps are never attempted.
//! 4. **Memory Consolidation**: time-adjacent short-term notes merged into
//!    long-term memories.
//!
//! All data is hardcoded and fictional. No external services are contacted.

pub mod mock_data;
pub mod runtime;
pub mod scenarios;

pub use runtime::AssistantRuntime;
