//! Plan generation: task description in, persisted pending `Plan` out.
//!
//! The generator gathers context (important memories, optional knowledge
//! excerpts, tools, constraints), asks the completion service for a JSON
//! step list, and persists the result as a pending plan.
//!
//! A reply that contains no JSON step list at all still produces a plan,
//! with no steps. A reply whose step list is present but malformed is a
//! `Validation` error and nothing is persisted.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use waypoint_contracts::{
    config::PlannerConfig,
    context::{ChatMessage, CompletionRequest, PlanContext},
    error::{WaypointError, WaypointResult},
    memory::{Memory, MemoryQuery},
    plan::{DraftStep, Plan},
};

use crate::{
    plan_store::PlanStore,
    traits::{Clock, CompletionService, KnowledgeBase, MemoryStore, SystemClock},
};

const PLANNER_SYSTEM_PROMPT: &str = "\
You break a task into an ordered list of steps for an autonomous agent.
Reply with a JSON array only. Each element is an object with:
  \"description\": what the step does (string, required)
  \"tool\": one of the available tools, or \"llm\" for pure text work (string, optional)
  \"action\": the tool operation to call (string, optional)
  \"params\": tool parameters (object, optional); use \"{{step_N_result}}\" to reference an earlier step's result
  \"dependencies\": indices of earlier steps that must complete first (array of integers, optional)
Steps may only depend on steps that come before them.";

static FENCED_BLOCK: OnceLock<Regex> = OnceLock::new();

fn fenced_block() -> &'static Regex {
    FENCED_BLOCK.get_or_init(|| {
        Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("fenced block pattern is a valid regex")
    })
}

/// Produces and persists new plans.
///
/// ```rust,ignore
/// let generator = PlanGenerator::new(plans, completion, memory, config.planner.clone())
///     .with_knowledge_base(kb);
/// let plan = generator.create_plan("Summarize today's unread mail", &ctx)?;
/// ```
pub struct PlanGenerator {
    plans: PlanStore,
    completion: Arc<dyn CompletionService>,
    memory: Arc<dyn MemoryStore>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    config: PlannerConfig,
    clock: Arc<dyn Clock>,
}

impl PlanGenerator {
    pub fn new(
        plans: PlanStore,
        completion: Arc<dyn CompletionService>,
        memory: Arc<dyn MemoryStore>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            plans,
            completion,
            memory,
            knowledge: None,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_knowledge_base(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Draft a plan for `task` and persist it as `pending`.
    ///
    /// # Errors
    ///
    /// Memory retrieval and completion failures propagate. A present but
    /// malformed step list is `WaypointError::Validation`.
    pub fn create_plan(&self, task: &str, ctx: &PlanContext) -> WaypointResult<Plan> {
        debug!(agent_id = %ctx.agent_id, task = %task, "creating plan");

        let memories = self.memory.retrieve(
            &MemoryQuery::for_agent(&ctx.agent_id)
                .min_importance(self.config.memory_min_importance)
                .limit(self.config.memory_limit),
        )?;
        let excerpts = self.knowledge_excerpts(task, ctx);

        let request = CompletionRequest {
            system_prompt: PLANNER_SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage::user(planning_brief(task, ctx, &memories, &excerpts))],
            temperature: self.config.temperature,
            model: self.config.model.clone(),
        };
        let reply = self.completion.complete(&request)?;

        let drafts = match extract_step_list(&reply) {
            Some(list) => parse_draft_steps(list)?,
            None => {
                warn!(
                    agent_id = %ctx.agent_id,
                    "no step list found in planner reply; creating an empty plan"
                );
                Vec::new()
            }
        };

        let plan = Plan::new(&ctx.agent_id, &ctx.owner_id, task, drafts, self.clock.now());
        self.plans.save(&plan)?;

        info!(
            plan_id = %plan.id,
            agent_id = %plan.agent_id,
            steps = plan.steps.len(),
            "plan created"
        );
        Ok(plan)
    }

    pub fn get_plan(&self, plan_id: &str, agent_id: &str) -> WaypointResult<Option<Plan>> {
        self.plans.get(plan_id, agent_id)
    }

    pub fn list_plans(&self, agent_id: &str) -> WaypointResult<Vec<Plan>> {
        self.plans.list(agent_id)
    }

    /// Knowledge lookup is best-effort: a failing knowledge base only costs
    /// the drafter some context.
    fn knowledge_excerpts(&self, task: &str, ctx: &PlanContext) -> Vec<String> {
        let Some(knowledge) = &self.knowledge else {
            return Vec::new();
        };
        if ctx.knowledge_base_ids.is_empty() {
            return Vec::new();
        }

        match knowledge.search(&ctx.knowledge_base_ids, task, self.config.knowledge_limit) {
            Ok(mut excerpts) => {
                excerpts.truncate(self.config.knowledge_limit);
                excerpts
            }
            Err(e) => {
                warn!(agent_id = %ctx.agent_id, error = %e, "knowledge base search failed");
                Vec::new()
            }
        }
    }
}

/// The user message handed to the drafting model.
fn planning_brief(task: &str, ctx: &PlanContext, memories: &[Memory], excerpts: &[String]) -> String {
    let mut brief = format!("Task: {task}\n");

    if ctx.available_tools.is_empty() {
        brief.push_str("\nAvailable tools: none (use \"llm\" steps only)\n");
    } else {
        brief.push_str(&format!("\nAvailable tools: {}\n", ctx.available_tools.join(", ")));
    }

    if !ctx.constraints.is_empty() {
        brief.push_str("\nConstraints:\n");
        for c in &ctx.constraints {
            brief.push_str(&format!("- {c}\n"));
        }
    }

    if !memories.is_empty() {
        brief.push_str("\nRelevant memories:\n");
        for m in memories {
            brief.push_str(&format!("- [{} {:.2}] {}\n", m.kind, m.importance, m.content));
        }
    }

    if !excerpts.is_empty() {
        brief.push_str("\nKnowledge base excerpts:\n");
        for e in excerpts {
            brief.push_str(&format!("- {e}\n"));
        }
    }

    brief
}

/// Find the JSON step list in a model reply.
///
/// Tries, in order: a fenced code block, the whole reply, and the outermost
/// `[` … `]` span. An object with a `steps` array is accepted too.
pub fn extract_step_list(reply: &str) -> Option<Value> {
    let fenced = fenced_block()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());

    let outer = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => Some(&reply[start..=end]),
        _ => None,
    };

    [fenced, Some(reply.trim()), outer]
        .into_iter()
        .flatten()
        .filter_map(|candidate| serde_json::from_str::<Value>(candidate.trim()).ok())
        .find_map(|value| match value {
            Value::Array(_) => Some(value),
            Value::Object(mut map) => match map.remove("steps") {
                Some(steps @ Value::Array(_)) => Some(steps),
                _ => None,
            },
            _ => None,
        })
}

fn step_list_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "required": ["description"],
            "properties": {
                "description": { "type": "string", "minLength": 1 },
                "tool": { "type": ["string", "null"] },
                "action": { "type": ["string", "null"] },
                "params": { "type": ["object", "null"] },
                "dependencies": {
                    "type": ["array", "null"],
                    "items": { "type": "integer", "minimum": 0 }
                }
            }
        }
    })
}

/// Validate a step list against the step schema and convert it.
pub fn parse_draft_steps(list: Value) -> WaypointResult<Vec<DraftStep>> {
    let validator = jsonschema::validator_for(&step_list_schema()).map_err(|e| WaypointError::Config {
        reason: format!("invalid step list schema: {e}"),
    })?;

    let violations: Vec<String> = validator
        .iter_errors(&list)
        .map(|e| format!("at {}: {}", e.instance_path, e))
        .collect();
    if !violations.is_empty() {
        return Err(WaypointError::validation(format!(
            "malformed step list: {}",
            violations.join("; ")
        )));
    }

    // Explicit nulls are accepted by the schema; drop them so serde defaults apply.
    let cleaned = match list {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => {
                        Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
                    }
                    other => other,
                })
                .collect(),
        ),
        other => other,
    };

    serde_json::from_value(cleaned)
        .map_err(|e| WaypointError::validation(format!("malformed step list: {e}")))
}
