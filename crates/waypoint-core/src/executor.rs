//! The plan executor: a single forward pass over a plan's steps.
//!
//! Per step, in order:
//!
//!   Cancellation check → Dependency gate → Rule gate → Rule actions →
//!   Placeholder resolution → Invoke → Record → Advance
//!
//! The step's service is never invoked unless every declared dependency is
//! already completed and the rule evaluation for that step did not signal a
//! stop. A failing step ends the plan; there are no retries. Dependencies are
//! checked once, when the step comes up: a step depending on a later index
//! is always skipped.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use waypoint_contracts::{
    config::ExecutorConfig,
    context::{EvaluationContext, StepSnapshot},
    error::{WaypointError, WaypointResult},
    memory::{MemoryKind, NewMemory},
    plan::{Plan, PlanStatus, StepStatus},
    rule::{Action, ActionKind, RuleEvaluation},
};

use crate::{
    lock::PlanLocks,
    plan_store::PlanStore,
    router::StepRouter,
    template::resolve_params,
    traits::{Clock, CompletionService, MemoryStore, RuleEvaluator, SystemClock, ToolInvoker},
};

/// Longest step result quoted in an episodic memory.
const MAX_SUMMARY_CHARS: usize = 500;

/// Tool and action used to deliver `send_notification` rule actions.
const NOTIFICATION_TOOL: &str = "notification";
const NOTIFICATION_ACTION: &str = "send";

/// Drives plans to a terminal status.
///
/// One executor can serve many plans; each `execute_plan` call holds an
/// advisory lock on its plan id for the duration of the run. Executors only
/// exclude each other when they share a `PlanLocks` table (see
/// `with_locks`).
pub struct PlanExecutor {
    plans: PlanStore,
    rules: Arc<dyn RuleEvaluator>,
    memory: Arc<dyn MemoryStore>,
    router: StepRouter,
    config: ExecutorConfig,
    clock: Arc<dyn Clock>,
    locks: PlanLocks,
}

impl PlanExecutor {
    pub fn new(
        plans: PlanStore,
        rules: Arc<dyn RuleEvaluator>,
        memory: Arc<dyn MemoryStore>,
        tools: Arc<dyn ToolInvoker>,
        completion: Arc<dyn CompletionService>,
        config: ExecutorConfig,
    ) -> Self {
        let router = StepRouter::new(tools, completion, &config);
        Self {
            plans,
            rules,
            memory,
            router,
            config,
            clock: Arc::new(SystemClock),
            locks: PlanLocks::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a lock table with other executors over the same store.
    pub fn with_locks(mut self, locks: PlanLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn get_plan(&self, plan_id: &str, agent_id: &str) -> WaypointResult<Option<Plan>> {
        self.plans.get(plan_id, agent_id)
    }

    /// Run (or resume) the plan from its `current_step_index`.
    ///
    /// Returns the plan in whatever state the run left it: `completed`,
    /// `failed` (with `error` naming the step index), or `cancelled` (by a
    /// rule or by `cancel_plan`).
    ///
    /// # Errors
    ///
    /// - `NotFound` if the agent has no such plan
    /// - `Conflict` if the plan is already executing
    /// - `InvalidTransition` if the plan is already `completed`, `failed` or
    ///   `cancelled`
    /// - store and rule-evaluation errors propagate as-is
    pub fn execute_plan(&self, plan_id: &str, agent_id: &str) -> WaypointResult<Plan> {
        let _guard = self.locks.acquire(plan_id)?;
        let mut plan = self.plans.require(plan_id, agent_id)?;

        if !plan.status.is_resumable() {
            warn!(plan_id = %plan_id, status = %plan.status, "plan is not resumable");
            return Err(WaypointError::InvalidTransition {
                from: plan.status.to_string(),
                to: PlanStatus::InProgress.to_string(),
            });
        }

        info!(
            plan_id = %plan_id,
            agent_id = %agent_id,
            from_step = plan.current_step_index,
            steps = plan.steps.len(),
            "executing plan"
        );
        plan.status = PlanStatus::InProgress;
        self.save(&mut plan)?;

        while plan.current_step_index < plan.steps.len() {
            let i = plan.current_step_index;

            // ── Cancellation check ───────────────────────────────────────────
            //
            // cancel_plan() writes the status from outside this loop; it is
            // honoured here, never mid-step.
            let persisted = self.plans.require(plan_id, agent_id)?;
            if persisted.status == PlanStatus::Cancelled {
                info!(plan_id = %plan_id, step = i, "plan cancelled externally");
                return Ok(persisted);
            }

            // ── Dependency gate ──────────────────────────────────────────────
            if let Some(dep) = plan.first_unmet_dependency(i) {
                debug!(plan_id = %plan_id, step = i, dependency = dep, "dependency unmet, skipping step");
                let step = &mut plan.steps[i];
                step.status = StepStatus::Skipped;
                step.error = Some(format!("dependency on step {} not completed", dep));
                plan.current_step_index = i + 1;
                self.save(&mut plan)?;
                continue;
            }

            // ── Rule gate ────────────────────────────────────────────────────
            let ctx = self.evaluation_context(&plan, i);
            let evaluation = self.rules.evaluate(&ctx)?;

            if evaluation.should_stop {
                let reason = stop_reason(&evaluation, i);
                warn!(plan_id = %plan_id, step = i, reason = %reason, "rule stopped plan execution");
                plan.status = PlanStatus::Cancelled;
                plan.error = Some(reason);
                self.save(&mut plan)?;
                return Ok(plan);
            }

            // ── Rule actions and placeholder resolution ──────────────────────
            let mut input = plan.steps[i].params.clone();
            self.apply_rule_actions(&plan, i, &evaluation.actions, &mut input);
            let params = resolve_params(&input, &plan, i);

            // ── Invoke ───────────────────────────────────────────────────────
            if self.adopt_cancellation(&mut plan)? {
                info!(plan_id = %plan_id, step = i, "plan cancelled externally");
                return Ok(plan);
            }
            plan.steps[i].status = StepStatus::InProgress;
            plan.steps[i].started_at = Some(self.clock.now());
            self.save(&mut plan)?;

            debug!(plan_id = %plan_id, step = i, tool = ?plan.steps[i].tool, "step starting");

            match self.router.run(&plan.steps[i], &params) {
                Ok(result) => {
                    let step = &mut plan.steps[i];
                    step.result = Some(result);
                    step.status = StepStatus::Completed;
                    step.completed_at = Some(self.clock.now());
                    debug!(plan_id = %plan_id, step = i, "step completed");
                }
                Err(e) => {
                    let message = failure_message(&e);
                    warn!(plan_id = %plan_id, step = i, error = %message, "step failed, failing plan");

                    let step = &mut plan.steps[i];
                    step.status = StepStatus::Failed;
                    step.error = Some(message.clone());
                    step.completed_at = Some(self.clock.now());

                    if !self.adopt_cancellation(&mut plan)? {
                        plan.status = PlanStatus::Failed;
                        plan.error = Some(format!("step {} failed: {}", i, message));
                    }
                    self.save(&mut plan)?;
                    return Ok(plan);
                }
            }

            // ── Advance, then record ─────────────────────────────────────────
            // A cancel_plan() that landed while the step ran must survive
            // this save; the finished step is still recorded.
            plan.current_step_index = i + 1;
            let cancelled = self.adopt_cancellation(&mut plan)?;
            self.save(&mut plan)?;
            self.record_step_memory(&plan, i)?;
            if cancelled {
                info!(plan_id = %plan_id, step = i, "plan cancelled during step");
                return Ok(plan);
            }
        }

        // ── Completion ───────────────────────────────────────────────────────
        let now = self.clock.now();
        plan.status = PlanStatus::Completed;
        plan.result = Some(plan.last_completed_result().unwrap_or(Value::Null));
        plan.completed_at = Some(now);
        self.save(&mut plan)?;
        self.record_completion_memory(&plan)?;

        info!(plan_id = %plan_id, agent_id = %agent_id, "plan completed");
        Ok(plan)
    }

    /// Mark a plan `cancelled`.
    ///
    /// Takes effect immediately for an idle plan; a running execution
    /// finishes the step in flight, records it, and stops there. Cancelling an already-cancelled
    /// plan is a no-op. Completed and failed plans cannot be cancelled.
    pub fn cancel_plan(&self, plan_id: &str, agent_id: &str) -> WaypointResult<()> {
        let mut plan = self.plans.require(plan_id, agent_id)?;

        match plan.status {
            PlanStatus::Cancelled => Ok(()),
            status if status.is_terminal() => Err(WaypointError::InvalidTransition {
                from: status.to_string(),
                to: PlanStatus::Cancelled.to_string(),
            }),
            _ => {
                info!(plan_id = %plan_id, step = plan.current_step_index, "cancelling plan");
                plan.status = PlanStatus::Cancelled;
                plan.error = Some(format!(
                    "cancelled by caller at step {}",
                    plan.current_step_index
                ));
                self.save(&mut plan)
            }
        }
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn save(&self, plan: &mut Plan) -> WaypointResult<()> {
        plan.updated_at = self.clock.now();
        self.plans.save(plan)
    }

    /// Copy a persisted `cancelled` status (and its error) onto `plan`.
    fn adopt_cancellation(&self, plan: &mut Plan) -> WaypointResult<bool> {
        let persisted = self.plans.require(&plan.id, &plan.agent_id)?;
        if persisted.status != PlanStatus::Cancelled {
            return Ok(false);
        }
        plan.status = PlanStatus::Cancelled;
        plan.error = persisted.error;
        Ok(true)
    }

    fn evaluation_context(&self, plan: &Plan, index: usize) -> EvaluationContext {
        let step = &plan.steps[index];
        EvaluationContext {
            agent_id: plan.agent_id.clone(),
            plan_id: plan.id.clone(),
            step_index: index,
            input: step.params.clone(),
            prior_results: plan.results_before(index),
            step: StepSnapshot {
                description: step.description.clone(),
                tool: step.tool.clone(),
                action: step.action.clone(),
            },
        }
    }

    /// Apply the non-stop actions of matched rules.
    ///
    /// `update_context` merges into the step input before placeholders are
    /// resolved. `store_memory`, `execute_tool` and `send_notification` are
    /// best-effort: failures are logged and never fail the step.
    fn apply_rule_actions(
        &self,
        plan: &Plan,
        index: usize,
        actions: &[Action],
        input: &mut Map<String, Value>,
    ) {
        for action in actions {
            match action.kind {
                ActionKind::UpdateContext => {
                    for (k, v) in &action.params {
                        input.insert(k.clone(), v.clone());
                    }
                }
                ActionKind::StoreMemory => {
                    let Some(content) = action.params.get("content").and_then(Value::as_str) else {
                        warn!(plan_id = %plan.id, step = index, "store_memory action without content");
                        continue;
                    };
                    let kind = action
                        .params
                        .get("kind")
                        .and_then(Value::as_str)
                        .and_then(MemoryKind::from_name)
                        .unwrap_or(MemoryKind::ShortTerm);
                    let importance = action
                        .params
                        .get("importance")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.5);
                    let memory = NewMemory::new(&plan.agent_id, &plan.owner_id, content, kind, importance)
                        .with_context(step_context(plan, index));
                    if let Err(e) = self.memory.store(memory) {
                        warn!(plan_id = %plan.id, step = index, error = %e, "store_memory action failed");
                    }
                }
                ActionKind::ExecuteTool => {
                    let Some(tool) = action.params.get("tool").and_then(Value::as_str) else {
                        warn!(plan_id = %plan.id, step = index, "execute_tool action without tool");
                        continue;
                    };
                    let tool_action = action
                        .params
                        .get("action")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let params = action
                        .params
                        .get("params")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default();
                    if let Err(e) = self.router.invoke_tool(tool, tool_action, &params) {
                        warn!(plan_id = %plan.id, step = index, tool = %tool, error = %e, "execute_tool action failed");
                    }
                }
                ActionKind::SendNotification => {
                    if let Err(e) =
                        self.router
                            .invoke_tool(NOTIFICATION_TOOL, NOTIFICATION_ACTION, &action.params)
                    {
                        warn!(plan_id = %plan.id, step = index, error = %e, "send_notification action failed");
                    }
                }
                ActionKind::StopExecution => {}
            }
        }
    }

    fn record_step_memory(&self, plan: &Plan, index: usize) -> WaypointResult<()> {
        let step = &plan.steps[index];
        let result_text = step
            .result
            .as_ref()
            .map(|r| match r {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        let content = format!(
            "Step {} of task \"{}\": {}. Result: {}",
            index,
            plan.task,
            step.description,
            truncate_chars(&result_text, MAX_SUMMARY_CHARS)
        );
        let memory = NewMemory::new(
            &plan.agent_id,
            &plan.owner_id,
            content,
            MemoryKind::Episodic,
            self.config.step_memory_importance,
        )
        .with_context(step_context(plan, index));

        self.memory.store(memory).map(|_| ())
    }

    fn record_completion_memory(&self, plan: &Plan) -> WaypointResult<()> {
        let completed = plan
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        let content = format!(
            "Completed task \"{}\" ({} of {} steps completed)",
            plan.task,
            completed,
            plan.steps.len()
        );

        let mut context = Map::new();
        context.insert("plan_id".to_string(), json!(plan.id));

        let memory = NewMemory::new(
            &plan.agent_id,
            &plan.owner_id,
            content,
            MemoryKind::LongTerm,
            self.config.completion_memory_importance,
        )
        .with_context(context);

        self.memory.store(memory).map(|_| ())
    }
}

fn step_context(plan: &Plan, index: usize) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("plan_id".to_string(), json!(plan.id));
    context.insert("step_index".to_string(), json!(index));
    if let Some(tool) = &plan.steps[index].tool {
        context.insert("tool".to_string(), json!(tool));
    }
    context
}

/// Why a rule stopped the plan, for `Plan::error`.
fn stop_reason(evaluation: &RuleEvaluation, index: usize) -> String {
    let Some(rule) = evaluation.stopping_rule() else {
        return format!("execution stopped by rule before step {}", index);
    };

    let detail = rule
        .actions
        .iter()
        .find(|a| a.is_stop())
        .and_then(|a| a.params.get("reason"))
        .and_then(Value::as_str)
        .unwrap_or("stop_execution action matched");

    format!("stopped by rule '{}' before step {}: {}", rule.name, index, detail)
}

fn failure_message(err: &WaypointError) -> String {
    match err {
        WaypointError::ExecutionFailure { reason } => reason.clone(),
        other => other.to_string(),
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use serde_json::{json, Map, Value};

    use waypoint_contracts::{
        config::ExecutorConfig,
        context::{CompletionRequest, EvaluationContext},
        error::{WaypointError, WaypointResult},
        memory::{ConsolidationReport, Memory, MemoryKind, MemoryQuery, MemoryStats, NewMemory},
        plan::{DraftStep, Plan, PlanStatus, StepStatus},
        rule::{Action, ActionKind, Rule, RuleEvaluation, RuleKind},
    };
    use waypoint_store::InMemoryKeyedStore;

    use crate::{
        lock::PlanLocks,
        plan_store::PlanStore,
        traits::{CompletionService, MemoryStore, RuleEvaluator, ToolInvoker},
    };

    use super::PlanExecutor;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// Returns a scripted evaluation for chosen step indices, empty otherwise.
    struct MockRules {
        stop_at: Option<usize>,
        actions_at: Vec<(usize, Action)>,
        seen: Arc<Mutex<Vec<EvaluationContext>>>,
    }

    impl MockRules {
        fn allow_all() -> Self {
            Self { stop_at: None, actions_at: vec![], seen: Arc::new(Mutex::new(vec![])) }
        }

        fn stop_at(index: usize) -> Self {
            Self { stop_at: Some(index), ..Self::allow_all() }
        }
    }

    fn guardrail(name: &str) -> Rule {
        Rule {
            id: "rule-1".to_string(),
            agent_id: "agent-1".to_string(),
            owner_id: "owner-1".to_string(),
            name: name.to_string(),
            description: String::new(),
            kind: RuleKind::Guardrail,
            priority: 100,
            enabled: true,
            conditions: vec![],
            actions: vec![Action::new(ActionKind::StopExecution).with_param("reason", "quiet hours")],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    impl RuleEvaluator for MockRules {
        fn evaluate(&self, ctx: &EvaluationContext) -> WaypointResult<RuleEvaluation> {
            self.seen.lock().unwrap().push(ctx.clone());
            if self.stop_at == Some(ctx.step_index) {
                let rule = guardrail("no-send-at-night");
                return Ok(RuleEvaluation {
                    actions: rule.actions.clone(),
                    matched_rules: vec![rule],
                    should_stop: true,
                });
            }
            let actions = self
                .actions_at
                .iter()
                .filter(|(i, _)| *i == ctx.step_index)
                .map(|(_, a)| a.clone())
                .collect();
            Ok(RuleEvaluation { matched_rules: vec![], actions, should_stop: false })
        }
    }

    /// Records every stored memory.
    #[derive(Default)]
    struct MockMemory {
        stored: Arc<Mutex<Vec<NewMemory>>>,
    }

    impl MemoryStore for MockMemory {
        fn store(&self, memory: NewMemory) -> WaypointResult<Memory> {
            self.stored.lock().unwrap().push(memory.clone());
            let now = Utc::now();
            Ok(Memory {
                id: format!("m-{}", self.stored.lock().unwrap().len()),
                agent_id: memory.agent_id,
                owner_id: memory.owner_id,
                kind: memory.kind,
                content: memory.content,
                context: memory.context,
                importance: memory.importance,
                access_count: 0,
                last_accessed_at: now,
                created_at: now,
                expires_at: None,
            })
        }

        fn retrieve(&self, _query: &MemoryQuery) -> WaypointResult<Vec<Memory>> {
            Ok(vec![])
        }

        fn consolidate(&self, _agent_id: &str, _owner_id: &str) -> WaypointResult<ConsolidationReport> {
            Ok(ConsolidationReport::default())
        }

        fn get_stats(&self, _agent_id: &str) -> WaypointResult<MemoryStats> {
            Ok(MemoryStats::default())
        }

        fn delete_memory(&self, _agent_id: &str, _memory_id: &str) -> WaypointResult<()> {
            Ok(())
        }
    }

    /// Echoes params back; fails for tools named in `failing`.
    #[derive(Default)]
    struct MockTools {
        failing: Vec<String>,
        calls: Arc<Mutex<Vec<(String, String, Map<String, Value>)>>>,
    }

    impl ToolInvoker for MockTools {
        fn invoke(&self, tool: &str, action: &str, params: &Map<String, Value>) -> WaypointResult<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((tool.to_string(), action.to_string(), params.clone()));
            if self.failing.iter().any(|t| t == tool) {
                return Err(WaypointError::ExecutionFailure {
                    reason: format!("{tool} is unavailable"),
                });
            }
            Ok(json!({ "tool": tool, "params": params }))
        }
    }

    /// Cancels its plan through the store while the first call is running.
    struct CancellingTools {
        plans: PlanStore,
        plan_id: Mutex<Option<String>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ToolInvoker for CancellingTools {
        fn invoke(&self, tool: &str, _action: &str, _params: &Map<String, Value>) -> WaypointResult<Value> {
            self.calls.lock().unwrap().push(tool.to_string());
            if let Some(plan_id) = self.plan_id.lock().unwrap().take() {
                let mut plan = self.plans.require(&plan_id, "agent-1")?;
                plan.status = PlanStatus::Cancelled;
                plan.error = Some("cancelled by caller at step 0".to_string());
                self.plans.save(&plan)?;
            }
            Ok(json!("done"))
        }
    }

    struct MockCompletion;

    impl CompletionService for MockCompletion {
        fn complete(&self, request: &CompletionRequest) -> WaypointResult<String> {
            Ok(format!("answer to: {}", request.messages[0].content))
        }
    }

    fn step(description: &str, tool: Option<&str>, params: Value, dependencies: Vec<usize>) -> DraftStep {
        DraftStep {
            description: description.to_string(),
            tool: tool.map(str::to_string),
            action: Some("run".to_string()),
            params: params.as_object().cloned().unwrap_or_default(),
            dependencies,
        }
    }

    struct Harness {
        executor: PlanExecutor,
        plans: PlanStore,
        tool_calls: Arc<Mutex<Vec<(String, String, Map<String, Value>)>>>,
        memories: Arc<Mutex<Vec<NewMemory>>>,
        contexts: Arc<Mutex<Vec<EvaluationContext>>>,
    }

    fn harness(rules: MockRules, failing: &[&str]) -> Harness {
        let plans = PlanStore::new(Arc::new(InMemoryKeyedStore::new()));
        let tools = MockTools { failing: failing.iter().map(|s| s.to_string()).collect(), ..Default::default() };
        let memory = MockMemory::default();
        let tool_calls = tools.calls.clone();
        let memories = memory.stored.clone();
        let contexts = rules.seen.clone();

        let executor = PlanExecutor::new(
            plans.clone(),
            Arc::new(rules),
            Arc::new(memory),
            Arc::new(tools),
            Arc::new(MockCompletion),
            ExecutorConfig::default(),
        );
        Harness { executor, plans, tool_calls, memories, contexts }
    }

    fn saved_plan(h: &Harness, steps: Vec<DraftStep>) -> Plan {
        let plan = Plan::new("agent-1", "owner-1", "weekly report", steps, Utc::now());
        h.plans.save(&plan).unwrap();
        plan
    }

    // ── Test cases ───────────────────────────────────────────────────────────

    #[test]
    fn test_all_steps_complete() {
        let h = harness(MockRules::allow_all(), &[]);
        let plan = saved_plan(
            &h,
            vec![
                step("fetch", Some("gmail"), json!({ "max": 3 }), vec![]),
                step("draft", Some("llm"), json!({ "prompt": "Summarize {{step_0_result}}" }), vec![0]),
            ],
        );

        let done = h.executor.execute_plan(&plan.id, "agent-1").unwrap();

        assert_eq!(done.status, PlanStatus::Completed);
        assert_eq!(done.current_step_index, 2);
        assert!(done.steps.iter().all(|s| s.status == StepStatus::Completed));
        assert!(done.completed_at.is_some());
        // The plan result is the last completed step's result.
        assert_eq!(done.result, done.steps[1].result);

        // Only the gmail step reached the tool invoker; the llm step used completion.
        assert_eq!(h.tool_calls.lock().unwrap().len(), 1);
        let summary = done.steps[1].result.as_ref().unwrap().as_str().unwrap();
        assert!(summary.contains("\"tool\":\"gmail\""), "placeholder should be resolved: {summary}");

        // One episodic memory per step plus one long-term completion memory.
        let memories = h.memories.lock().unwrap();
        assert_eq!(memories.len(), 3);
        assert_eq!(memories[0].kind, MemoryKind::Episodic);
        assert_eq!(memories[0].importance, 0.6);
        assert_eq!(memories[2].kind, MemoryKind::LongTerm);
        assert_eq!(memories[2].importance, 0.8);

        // Persisted state matches the returned plan.
        let stored = h.plans.require(&plan.id, "agent-1").unwrap();
        assert_eq!(stored.status, PlanStatus::Completed);
    }

    #[test]
    fn test_failing_step_halts_plan() {
        let h = harness(MockRules::allow_all(), &["calendar"]);
        let plan = saved_plan(
            &h,
            vec![
                step("fetch", Some("gmail"), json!({}), vec![]),
                step("book", Some("calendar"), json!({}), vec![]),
                step("notify", Some("slack"), json!({}), vec![]),
            ],
        );

        let done = h.executor.execute_plan(&plan.id, "agent-1").unwrap();

        assert_eq!(done.status, PlanStatus::Failed);
        assert!(done.error.as_deref().unwrap().contains("step 1"));
        assert_eq!(done.steps[0].status, StepStatus::Completed);
        assert_eq!(done.steps[1].status, StepStatus::Failed);
        assert_eq!(done.steps[1].error.as_deref(), Some("calendar is unavailable"));
        assert_eq!(done.steps[2].status, StepStatus::Pending);
        assert!(done.steps[2].started_at.is_none());
        // The failed step was never advanced past.
        assert_eq!(done.current_step_index, 1);
        // slack was never called.
        assert_eq!(h.tool_calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_plan_cannot_resume() {
        let h = harness(MockRules::allow_all(), &["calendar"]);
        let plan = saved_plan(&h, vec![step("book", Some("calendar"), json!({}), vec![])]);

        h.executor.execute_plan(&plan.id, "agent-1").unwrap();
        let again = h.executor.execute_plan(&plan.id, "agent-1");

        assert!(matches!(again, Err(WaypointError::InvalidTransition { .. })));
    }

    #[test]
    fn test_rule_stop_cancels_before_step() {
        let h = harness(MockRules::stop_at(0), &[]);
        let plan = saved_plan(&h, vec![step("send", Some("gmail"), json!({}), vec![])]);

        let done = h.executor.execute_plan(&plan.id, "agent-1").unwrap();

        assert_eq!(done.status, PlanStatus::Cancelled);
        assert_eq!(done.current_step_index, 0);
        assert_eq!(done.steps[0].status, StepStatus::Pending);
        let error = done.error.unwrap();
        assert!(error.contains("no-send-at-night"));
        assert!(error.contains("quiet hours"));
        assert!(h.tool_calls.lock().unwrap().is_empty(), "no tool may run after a stop");
    }

    #[test]
    fn test_unmet_and_forward_dependencies_skip() {
        let h = harness(MockRules::allow_all(), &["calendar"]);
        let plan = saved_plan(
            &h,
            vec![
                // Depends on a later step: never satisfiable in a forward pass.
                step("early", Some("gmail"), json!({}), vec![1]),
                step("independent", Some("slack"), json!({}), vec![]),
                // Depends on the skipped step.
                step("needs early", Some("gmail"), json!({}), vec![0]),
            ],
        );

        let done = h.executor.execute_plan(&plan.id, "agent-1").unwrap();

        assert_eq!(done.status, PlanStatus::Completed);
        assert_eq!(done.steps[0].status, StepStatus::Skipped);
        assert_eq!(done.steps[1].status, StepStatus::Completed);
        assert_eq!(done.steps[2].status, StepStatus::Skipped);
        assert!(done.steps[0].started_at.is_none());
        assert_eq!(done.current_step_index, 3);

        // Skipped steps are never offered to the rule engine.
        let evaluated: Vec<usize> = h.contexts.lock().unwrap().iter().map(|c| c.step_index).collect();
        assert_eq!(evaluated, vec![1]);
    }

    #[test]
    fn test_rule_context_carries_prior_results() {
        let h = harness(MockRules::allow_all(), &[]);
        let plan = saved_plan(
            &h,
            vec![
                step("a", Some("gmail"), json!({ "q": "unread" }), vec![]),
                step("b", Some("slack"), json!({ "channel": "ops" }), vec![]),
            ],
        );

        h.executor.execute_plan(&plan.id, "agent-1").unwrap();

        let contexts = h.contexts.lock().unwrap();
        assert_eq!(contexts.len(), 2);
        assert!(contexts[0].prior_results.is_empty());
        assert_eq!(contexts[1].prior_results.len(), 1);
        assert_eq!(contexts[1].input["channel"], json!("ops"));
        assert_eq!(contexts[1].step.tool.as_deref(), Some("slack"));
    }

    #[test]
    fn test_update_context_action_merges_params() {
        let mut rules = MockRules::allow_all();
        rules.actions_at.push((
            0,
            Action::new(ActionKind::UpdateContext).with_param("cc", "audit@example.com"),
        ));
        rules
            .actions_at
            .push((0, Action::new(ActionKind::SendNotification).with_param("text", "sending mail")));
        let h = harness(rules, &[]);
        let plan = saved_plan(&h, vec![step("send", Some("gmail"), json!({ "to": "a@example.com" }), vec![])]);

        h.executor.execute_plan(&plan.id, "agent-1").unwrap();

        let calls = h.tool_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "notification");
        assert_eq!(calls[1].0, "gmail");
        assert_eq!(calls[1].2["cc"], json!("audit@example.com"));
        assert_eq!(calls[1].2["to"], json!("a@example.com"));
    }

    #[test]
    fn test_cancelled_plan_is_not_executed() {
        let h = harness(MockRules::allow_all(), &[]);
        let plan = saved_plan(&h, vec![step("a", Some("gmail"), json!({}), vec![])]);

        h.executor.cancel_plan(&plan.id, "agent-1").unwrap();
        // Idempotent.
        h.executor.cancel_plan(&plan.id, "agent-1").unwrap();

        let result = h.executor.execute_plan(&plan.id, "agent-1");
        assert!(matches!(result, Err(WaypointError::InvalidTransition { .. })));
        assert!(h.tool_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_during_step_is_honoured() {
        let plans = PlanStore::new(Arc::new(InMemoryKeyedStore::new()));
        let calls = Arc::new(Mutex::new(vec![]));
        let memory = MockMemory::default();
        let memories = memory.stored.clone();
        let plan = Plan::new(
            "agent-1",
            "owner-1",
            "weekly report",
            vec![
                step("a", Some("gmail"), json!({}), vec![]),
                step("b", Some("slack"), json!({}), vec![]),
                step("c", Some("slack"), json!({}), vec![]),
            ],
            Utc::now(),
        );
        plans.save(&plan).unwrap();

        let tools = CancellingTools {
            plans: plans.clone(),
            plan_id: Mutex::new(Some(plan.id.clone())),
            calls: calls.clone(),
        };
        let executor = PlanExecutor::new(
            plans.clone(),
            Arc::new(MockRules::allow_all()),
            Arc::new(memory),
            Arc::new(tools),
            Arc::new(MockCompletion),
            ExecutorConfig::default(),
        );

        let done = executor.execute_plan(&plan.id, "agent-1").unwrap();

        assert_eq!(done.status, PlanStatus::Cancelled);
        assert_eq!(done.error.as_deref(), Some("cancelled by caller at step 0"));
        // The running step finishes and is recorded; nothing after it runs.
        assert_eq!(done.steps[0].status, StepStatus::Completed);
        assert_eq!(done.steps[1].status, StepStatus::Pending);
        assert_eq!(done.current_step_index, 1);
        assert_eq!(*calls.lock().unwrap(), vec!["gmail".to_string()]);

        let stored = plans.require(&plan.id, "agent-1").unwrap();
        assert_eq!(stored.status, PlanStatus::Cancelled);
        assert_eq!(stored.current_step_index, 1);

        // Step memory only; no completion memory for a cancelled plan.
        let memories = memories.lock().unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].kind, MemoryKind::Episodic);
    }

    #[test]
    fn test_executors_sharing_locks_conflict() {
        let h = harness(MockRules::allow_all(), &[]);
        let plan = saved_plan(&h, vec![step("a", Some("gmail"), json!({}), vec![])]);
        let locks = PlanLocks::new();
        let first = PlanExecutor::new(
            h.plans.clone(),
            Arc::new(MockRules::allow_all()),
            Arc::new(MockMemory::default()),
            Arc::new(MockTools::default()),
            Arc::new(MockCompletion),
            ExecutorConfig::default(),
        )
        .with_locks(locks.clone());
        let second = PlanExecutor::new(
            h.plans.clone(),
            Arc::new(MockRules::allow_all()),
            Arc::new(MockMemory::default()),
            Arc::new(MockTools::default()),
            Arc::new(MockCompletion),
            ExecutorConfig::default(),
        )
        .with_locks(locks.clone());

        let guard = locks.acquire(&plan.id).unwrap();
        assert!(matches!(first.execute_plan(&plan.id, "agent-1"), Err(WaypointError::Conflict { .. })));
        assert!(matches!(second.execute_plan(&plan.id, "agent-1"), Err(WaypointError::Conflict { .. })));
        drop(guard);

        let done = second.execute_plan(&plan.id, "agent-1").unwrap();
        assert_eq!(done.status, PlanStatus::Completed);
    }

    #[test]
    fn test_completed_plan_cannot_be_cancelled() {
        let h = harness(MockRules::allow_all(), &[]);
        let plan = saved_plan(&h, vec![step("a", Some("gmail"), json!({}), vec![])]);
        h.executor.execute_plan(&plan.id, "agent-1").unwrap();

        let result = h.executor.cancel_plan(&plan.id, "agent-1");
        assert!(matches!(result, Err(WaypointError::InvalidTransition { .. })));
    }

    #[test]
    fn test_resume_from_persisted_index() {
        let h = harness(MockRules::allow_all(), &[]);
        let mut plan = saved_plan(
            &h,
            vec![
                step("a", Some("gmail"), json!({}), vec![]),
                step("b", Some("slack"), json!({}), vec![0]),
            ],
        );
        // Simulate an interrupted run that finished step 0.
        plan.status = PlanStatus::InProgress;
        plan.steps[0].status = StepStatus::Completed;
        plan.steps[0].result = Some(json!("earlier"));
        plan.current_step_index = 1;
        h.plans.save(&plan).unwrap();

        let done = h.executor.execute_plan(&plan.id, "agent-1").unwrap();

        assert_eq!(done.status, PlanStatus::Completed);
        let calls = h.tool_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "slack");
    }

    #[test]
    fn test_unknown_plan_is_not_found() {
        let h = harness(MockRules::allow_all(), &[]);
        let result = h.executor.execute_plan("missing", "agent-1");
        assert!(matches!(result, Err(WaypointError::NotFound { .. })));

        // Plans are scoped by agent.
        let plan = saved_plan(&h, vec![]);
        let other_agent = h.executor.execute_plan(&plan.id, "agent-2");
        assert!(matches!(other_agent, Err(WaypointError::NotFound { .. })));
    }

    #[test]
    fn test_empty_plan_completes_with_null_result() {
        let h = harness(MockRules::allow_all(), &[]);
        let plan = saved_plan(&h, vec![]);

        let done = h.executor.execute_plan(&plan.id, "agent-1").unwrap();

        assert_eq!(done.status, PlanStatus::Completed);
        assert_eq!(done.result, Some(Value::Null));
    }
}
