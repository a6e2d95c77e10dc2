//! Scenario 3: Calendar Outage
//!
//! The calendar service is down. The plan finds the review invite, books a
//! prep meeting and then tells Slack about it. The booking step fails, the
//! plan fails with it, and the Slack step is never attempted.

use waypoint_contracts::{config::WaypointConfig, error::WaypointResult, plan::Plan};

use super::{print_plan, seeded_runtime};
use crate::{
    mock_data::{MockToolbox, ScriptedCompletion},
    runtime::{AssistantRuntime, AGENT_ID},
};

pub const TASK: &str = "Book a budget prep session before the Q3 review and tell the team";

pub const PLAN_REPLY: &str = r##"```
{
  "steps": [
    { "description": "Find the Q3 review invite", "tool": "gmail", "action": "list_unread", "params": { "max": 1 } },
    {
      "description": "Book the prep session",
      "tool": "calendar",
      "action": "book",
      "params": { "title": "Q3 budget prep", "minutes": 30 },
      "dependencies": [0]
    },
    {
      "description": "Tell the team",
      "tool": "slack",
      "action": "post_message",
      "params": { "channel": "#finance", "text": "Prep session booked: {{step_1_result}}" },
      "dependencies": [1]
    }
  ]
}
```"##;

pub fn run(runtime: &AssistantRuntime) -> WaypointResult<Plan> {
    let plan = runtime.planner.create_plan(TASK, &runtime.context())?;
    runtime.executor.execute_plan(&plan.id, AGENT_ID)
}

/// Run Scenario 3: Calendar Outage.
pub fn run_scenario(config: &WaypointConfig) -> WaypointResult<Plan> {
    println!("=== Scenario 3: Calendar Outage ===");
    println!();

    let runtime = seeded_runtime(
        config,
        MockToolbox::new().with_offline("calendar"),
        ScriptedCompletion::new().with_plan(PLAN_REPLY),
    )?;

    println!("  Task: {}", TASK);
    println!("  Offline tools: calendar");
    println!();

    let plan = run(&runtime)?;
    print_plan(&plan);

    println!();
    println!("  Scenario 3 complete.");
    println!();

    Ok(plan)
}
