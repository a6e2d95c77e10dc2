//! Rule, condition, and action types.
//!
//! A rule belongs to exactly one agent. Its conditions are folded left to
//! right, each condition's own `logical_operator` combining it with the
//! running result. There is no precedence grouping: `a OR b AND c` is
//! `(a OR b) AND c`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a rule is for. Informational only; evaluation treats all kinds alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Trigger,
    Condition,
    Action,
    Guardrail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    Regex,
    Exists,
}

impl ConditionOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Regex => "regex",
            Self::Exists => "exists",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// A single comparison against a dot-path field of the evaluation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dot-separated path, e.g. `"input.recipient.domain"`.
    pub field: String,
    pub operator: ConditionOperator,
    /// Comparison operand. Unused by `exists`.
    #[serde(default)]
    pub value: Value,
    /// How this condition joins the running result. Defaults to AND.
    #[serde(default)]
    pub logical_operator: Option<LogicalOperator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ExecuteTool,
    SendNotification,
    StoreMemory,
    UpdateContext,
    StopExecution,
}

/// An effect requested by a matched rule.
///
/// Only `StopExecution` means anything to the engine; the rest are payloads
/// forwarded to whoever asked for the evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn is_stop(&self) -> bool {
        self.kind == ActionKind::StopExecution
    }
}

/// The operator-supplied part of a rule: everything except identity and
/// timestamps. Also the shape of a `[[rules]]` table in a TOML rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

fn default_enabled() -> bool {
    true
}

/// A persisted, prioritized condition→action rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub agent_id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub kind: RuleKind,
    /// Higher values are evaluated first.
    pub priority: i64,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn has_stop_action(&self) -> bool {
        self.actions.iter().any(Action::is_stop)
    }
}

/// A partial update to an existing rule. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<RuleKind>,
    pub priority: Option<i64>,
    pub enabled: Option<bool>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<Action>>,
}

/// The aggregate produced by one rule evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    /// Rules whose conditions held, in evaluation order.
    pub matched_rules: Vec<Rule>,
    /// The matched rules' actions, concatenated in the same order.
    pub actions: Vec<Action>,
    /// True when a matched rule carried `stop_execution`.
    pub should_stop: bool,
}

impl RuleEvaluation {
    /// The rule that raised the stop signal. Evaluation halts on it, so it is
    /// always the last matched rule.
    pub fn stopping_rule(&self) -> Option<&Rule> {
        if self.should_stop {
            self.matched_rules.last()
        } else {
            None
        }
    }
}
