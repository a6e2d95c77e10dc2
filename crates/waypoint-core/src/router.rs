//! Dispatch of a single step to the service that performs it.
//!
//! Steps whose tool is `llm`, or that name no tool at all, are answered by
//! the completion service. Everything else goes to the tool invoker.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use waypoint_contracts::{
    config::ExecutorConfig,
    context::{ChatMessage, CompletionRequest},
    error::WaypointResult,
    plan::Step,
};

use crate::traits::{CompletionService, ToolInvoker};

/// Tool name reserved for generic completion steps.
pub const LLM_TOOL: &str = "llm";

const STEP_SYSTEM_PROMPT: &str =
    "You are an assistant carrying out one step of a larger plan. Answer with the step's result only.";

pub struct StepRouter {
    tools: Arc<dyn ToolInvoker>,
    completion: Arc<dyn CompletionService>,
    model: String,
    temperature: f64,
}

impl StepRouter {
    pub fn new(
        tools: Arc<dyn ToolInvoker>,
        completion: Arc<dyn CompletionService>,
        config: &ExecutorConfig,
    ) -> Self {
        Self {
            tools,
            completion,
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    /// Perform `step` with already-resolved `params`.
    pub fn run(&self, step: &Step, params: &Map<String, Value>) -> WaypointResult<Value> {
        match step.tool.as_deref() {
            None | Some(LLM_TOOL) => self.run_completion(step, params),
            Some(tool) => {
                let action = step.action.as_deref().unwrap_or_default();
                debug!(tool = %tool, action = %action, "invoking tool");
                self.tools.invoke(tool, action, params)
            }
        }
    }

    /// Call the tool invoker directly, bypassing `llm` routing.
    pub fn invoke_tool(
        &self,
        tool: &str,
        action: &str,
        params: &Map<String, Value>,
    ) -> WaypointResult<Value> {
        self.tools.invoke(tool, action, params)
    }

    /// `params.prompt` is the user message, falling back to the step
    /// description. `params.system` overrides the system prompt.
    fn run_completion(&self, step: &Step, params: &Map<String, Value>) -> WaypointResult<Value> {
        let prompt = params
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or(&step.description);
        let system_prompt = params
            .get("system")
            .and_then(Value::as_str)
            .unwrap_or(STEP_SYSTEM_PROMPT);

        debug!(model = %self.model, order = step.order, "running completion step");

        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.temperature,
            model: self.model.clone(),
        };
        self.completion.complete(&request).map(Value::String)
    }
}
