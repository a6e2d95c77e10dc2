//! Scenario 2: Partner Mail Guardrail
//!
//! The assistant is asked to confirm receipt of a partner's contract. The
//! plan's final step would email `cfo@partner.org`; the
//! `no-mail-to-partners` guardrail matches that step and cancels the plan
//! before any mail leaves.

use waypoint_contracts::{config::WaypointConfig, error::WaypointResult, plan::Plan};

use super::{print_plan, seeded_runtime};
use crate::{
    mock_data::{MockToolbox, ScriptedCompletion},
    runtime::{AssistantRuntime, AGENT_ID},
};

pub const TASK: &str = "Confirm receipt of the signed contract";

pub const PLAN_REPLY: &str = r#"[
  {
    "description": "Find the contract email",
    "tool": "gmail",
    "action": "list_unread",
    "params": { "max": 3 }
  },
  {
    "description": "Draft a short confirmation",
    "tool": "llm",
    "params": { "prompt": "Draft a one-line receipt confirmation for: {{step_0_result}}" },
    "dependencies": [0]
  },
  {
    "description": "Reply to the sender",
    "tool": "gmail",
    "action": "send",
    "params": { "to": "cfo@partner.org", "subject": "Re: Signed contract attached", "body": "{{step_1_result}}" },
    "dependencies": [1]
  }
]"#;

pub fn run(runtime: &AssistantRuntime) -> WaypointResult<Plan> {
    let plan = runtime.planner.create_plan(TASK, &runtime.context())?;
    runtime.executor.execute_plan(&plan.id, AGENT_ID)
}

/// Run Scenario 2: Partner Mail Guardrail.
pub fn run_scenario(config: &WaypointConfig) -> WaypointResult<Plan> {
    println!("=== Scenario 2: Partner Mail Guardrail ===");
    println!();

    let runtime = seeded_runtime(
        config,
        MockToolbox::new(),
        ScriptedCompletion::new().with_plan(PLAN_REPLY),
    )?;

    println!("  Task: {}", TASK);
    println!("  Rules loaded: {}", runtime.rules.list_rules(AGENT_ID)?.len());
    println!();

    let plan = run(&runtime)?;
    print_plan(&plan);

    let sent = runtime
        .toolbox
        .calls()
        .iter()
        .filter(|c| c.tool == "gmail" && c.action == "send")
        .count();
    println!("  Emails sent:  {}", sent);
    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(plan)
}
