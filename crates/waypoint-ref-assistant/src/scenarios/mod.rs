//! Reference assistant scenarios.
//!
//! Each scenario wires a fresh `AssistantRuntime` with the rules in
//! `rules/assistant.toml`, scripts the model's plan, and drives one plan
//! (or one memory pass) to a terminal state, printing what happened.

pub mod consolidate;
pub mod digest;
pub mod failing_step;
pub mod guardrail;

use waypoint_contracts::{config::WaypointConfig, error::WaypointResult, plan::Plan};

use crate::{
    mock_data::{MockToolbox, ScriptedCompletion},
    runtime::{AssistantRuntime, AGENT_ID, OWNER_ID},
};

/// The reference agent's rule set.
pub const ASSISTANT_RULES: &str = include_str!("../../rules/assistant.toml");

/// A runtime with the assistant rules already seeded.
pub fn seeded_runtime(
    config: &WaypointConfig,
    toolbox: MockToolbox,
    completion: ScriptedCompletion,
) -> WaypointResult<AssistantRuntime> {
    let runtime = AssistantRuntime::new(config, toolbox, completion);
    runtime.rules.seed_from_toml(AGENT_ID, OWNER_ID, ASSISTANT_RULES)?;
    Ok(runtime)
}

/// Print one line per step, then the plan outcome.
pub fn print_plan(plan: &Plan) {
    for step in &plan.steps {
        let tool = step.tool.as_deref().unwrap_or("llm");
        let detail = step.error.as_deref().unwrap_or_default();
        println!(
            "    [{:>2}] {:<11} {:<8} {} {}",
            step.order,
            step.status.as_str(),
            tool,
            step.description,
            detail
        );
    }
    println!();
    println!("  Plan status:  {}", plan.status);
    println!("  Step index:   {} of {}", plan.current_step_index, plan.steps.len());
    if let Some(error) = &plan.error {
        println!("  Plan error:   {}", error);
    }
}
