//! Inputs handed across component boundaries: the planning context, the
//! rule evaluation snapshot, and completion requests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What the caller knows when asking for a new plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanContext {
    pub agent_id: String,
    pub owner_id: String,
    /// Tool names the drafted steps may reference.
    #[serde(default)]
    pub available_tools: Vec<String>,
    #[serde(default)]
    pub knowledge_base_ids: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// The parts of the upcoming step a rule may inspect under `step.*`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub description: String,
    pub tool: Option<String>,
    pub action: Option<String>,
}

/// The snapshot a rule set is evaluated against before each step.
///
/// Rule conditions address it by dot path over its serialized form, e.g.
/// `step_index`, `input.recipient`, `prior_results.0.status`, `step.tool`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub agent_id: String,
    pub plan_id: String,
    pub step_index: usize,
    /// The step's parameters before placeholder resolution.
    pub input: Map<String, Value>,
    /// Results of steps `0..step_index`, `null` where a step has none.
    pub prior_results: Vec<Value>,
    pub step: StepSnapshot,
}

impl EvaluationContext {
    /// A context for ad-hoc evaluation outside of a plan.
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    /// The serialized form conditions are resolved against.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// One call to the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub model: String,
}
