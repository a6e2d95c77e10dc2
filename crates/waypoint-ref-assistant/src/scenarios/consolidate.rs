//! Scenario 4: Memory Consolidation
//!
//! A morning of short-term notes is consolidated into long-term memory.
//! Notes are written on a scripted clock at 09:00, 09:30 and 11:05; with
//! the default 60-minute window the first two merge and the third stands
//! alone. A low-importance note stays short-term.

use std::sync::Arc;

use chrono::Duration;

use waypoint_contracts::{
    config::WaypointConfig,
    error::WaypointResult,
    memory::{ConsolidationReport, MemoryKind, NewMemory},
};
use waypoint_core::traits::MemoryStore;

use crate::{
    mock_data::{MockToolbox, ScriptedClock, ScriptedCompletion},
    runtime::{AssistantRuntime, AGENT_ID, OWNER_ID},
};

/// `(minutes after 09:00, content, importance)`
pub const NOTES: &[(i64, &str, f64)] = &[
    (0, "Owner prefers morning digests in bullet points", 0.8),
    (30, "Owner asked to keep Thursdays free of meetings", 0.9),
    (125, "Contracts from partner.org go to legal first", 0.75),
    (140, "Coffee machine on floor 3 is broken", 0.2),
];

/// Write `NOTES` on `clock` and consolidate them.
pub fn run(runtime: &AssistantRuntime, clock: &ScriptedClock) -> WaypointResult<ConsolidationReport> {
    let mut elapsed = 0;
    for (minute, content, importance) in NOTES {
        clock.advance(Duration::minutes(minute - elapsed));
        elapsed = *minute;
        runtime.memory.store(NewMemory::new(
            AGENT_ID,
            OWNER_ID,
            *content,
            MemoryKind::ShortTerm,
            *importance,
        ))?;
    }

    runtime.memory.consolidate(AGENT_ID, OWNER_ID)
}

/// Run Scenario 4: Memory Consolidation.
pub fn run_scenario(config: &WaypointConfig) -> WaypointResult<ConsolidationReport> {
    println!("=== Scenario 4: Memory Consolidation ===");
    println!();

    let clock = Arc::new(ScriptedClock::monday_morning());
    let runtime = AssistantRuntime::with_clock(
        config,
        MockToolbox::new(),
        ScriptedCompletion::new(),
        clock.clone(),
    );

    println!(
        "  Window: {} min, threshold: {:.2}",
        config.memory.consolidation_window_minutes, config.memory.consolidation_min_importance
    );
    println!();

    let report = run(&runtime, &clock)?;

    for memory in &report.created {
        println!("    long_term {:.2}  {}", memory.importance, memory.content);
    }
    println!();

    let stats = runtime.memory.get_stats(AGENT_ID)?;
    println!("  Created:      {}", report.created.len());
    println!("  Removed:      {}", report.removed);
    for (kind, count) in &stats.by_kind {
        println!("  {:<13} {}", format!("{}:", kind), count);
    }
    println!();
    println!("  Scenario 4 complete.");
    println!();

    Ok(report)
}
