//! Scenario 1: Morning Digest
//!
//! The assistant plans and runs a four-step digest: fetch unread mail,
//! summarize it, post the summary to Slack, and mail it to the owner.
//!
//! Walk-through:
//!   1. The planner drafts the plan with memories and handbook excerpts
//!   2. Step 1 reads `{{step_0_result}}`; steps 2 and 3 read `{{step_1_result}}`
//!   3. `remember-slack-posts` stores a memory and notifies before step 2
//!   4. `audit-outgoing-mail` adds a `bcc` to step 3's parameters
//!   5. Every step leaves an episodic memory; completion a long-term one

use waypoint_contracts::{config::WaypointConfig, error::WaypointResult, plan::Plan};
use waypoint_core::traits::MemoryStore;

use super::{print_plan, seeded_runtime};
use crate::{
    mock_data::{MockToolbox, ScriptedCompletion},
    runtime::{AssistantRuntime, AGENT_ID},
};

pub const TASK: &str = "Send me a digest of my unread email";

/// The model's reply to the planning request.
pub const PLAN_REPLY: &str = r##"Here is the plan:
```json
[
  {
    "description": "Fetch unread email",
    "tool": "gmail",
    "action": "list_unread",
    "params": { "max": 3 }
  },
  {
    "description": "Summarize the unread email",
    "tool": "llm",
    "params": { "prompt": "Summarize these emails for a morning digest: {{step_0_result}}" },
    "dependencies": [0]
  },
  {
    "description": "Post the digest to Slack",
    "tool": "slack",
    "action": "post_message",
    "params": { "channel": "#me", "text": "{{step_1_result}}" },
    "dependencies": [1]
  },
  {
    "description": "Email the digest to the owner",
    "tool": "gmail",
    "action": "send",
    "params": { "to": "owner@example.com", "subject": "Morning digest", "body": "{{step_1_result}}" },
    "dependencies": [1]
  }
]
```"##;

/// Plan and execute the digest on `runtime`.
pub fn run(runtime: &AssistantRuntime) -> WaypointResult<Plan> {
    let plan = runtime.planner.create_plan(TASK, &runtime.context())?;
    runtime.executor.execute_plan(&plan.id, AGENT_ID)
}

/// Run Scenario 1: Morning Digest.
pub fn run_scenario(config: &WaypointConfig) -> WaypointResult<Plan> {
    println!("=== Scenario 1: Morning Digest ===");
    println!();

    let runtime = seeded_runtime(
        config,
        MockToolbox::new(),
        ScriptedCompletion::new().with_plan(PLAN_REPLY),
    )?;

    println!("  Task: {}", TASK);
    println!();

    let plan = run(&runtime)?;
    print_plan(&plan);

    if let Some(result) = &plan.result {
        println!("  Plan result:  {}", result);
    }

    let stats = runtime.memory.get_stats(AGENT_ID)?;
    println!(
        "  Memories:     {} stored (avg importance {:.2})",
        stats.total, stats.avg_importance
    );
    println!("  Tool calls:   {}", runtime.toolbox.calls().len());
    println!();
    println!("  Scenario 1 complete.");
    println!();

    Ok(plan)
}
