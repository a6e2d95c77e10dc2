//! Plan and step types.
//!
//! A `Plan` is produced once by the generator and then mutated only by the
//! executor until it reaches a terminal status. It owns its steps outright;
//! a step's `order` is its index in `Plan::steps` and never changes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle of a whole plan.
///
/// `Pending → InProgress → {Completed | Failed | Cancelled}`. `InProgress` is
/// re-entrant so an interrupted execution can resume from its persisted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// True if execution may start or resume from this status.
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single step.
///
/// `Pending → InProgress → {Completed | Failed}`, or `Pending → Skipped` when
/// a dependency was not completed at the time the step came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step as drafted by the completion service, before it joins a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftStep {
    pub description: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Indices of the steps that must be completed first.
    #[serde(default)]
    pub dependencies: Vec<usize>,
}

/// One unit of work within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    /// Position in the owning plan at creation time. Immutable.
    pub order: usize,
    pub description: String,
    pub tool: Option<String>,
    pub action: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub status: StepStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// Indices into the same plan's `steps`.
    #[serde(default)]
    pub dependencies: Vec<usize>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    /// Build a pending step at position `order` from a drafted step.
    pub fn from_draft(order: usize, draft: DraftStep) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order,
            description: draft.description,
            tool: draft.tool,
            action: draft.action,
            params: draft.params,
            status: StepStatus::Pending,
            result: None,
            error: None,
            dependencies: draft.dependencies,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// An ordered, dependency-aware set of steps for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub agent_id: String,
    pub owner_id: String,
    pub task: String,
    pub steps: Vec<Step>,
    pub status: PlanStatus,
    /// Next step to attempt. Only ever moves forward.
    pub current_step_index: usize,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Plan {
    /// Create a pending plan whose steps take their `order` from `drafts`.
    pub fn new(
        agent_id: impl Into<String>,
        owner_id: impl Into<String>,
        task: impl Into<String>,
        drafts: Vec<DraftStep>,
        now: DateTime<Utc>,
    ) -> Self {
        let steps = drafts
            .into_iter()
            .enumerate()
            .map(|(order, draft)| Step::from_draft(order, draft))
            .collect();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            owner_id: owner_id.into(),
            task: task.into(),
            steps,
            status: PlanStatus::Pending,
            current_step_index: 0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Results of the steps before `index`, `Null` where a step has none.
    pub fn results_before(&self, index: usize) -> Vec<Value> {
        self.steps
            .iter()
            .take(index)
            .map(|s| s.result.clone().unwrap_or(Value::Null))
            .collect()
    }

    /// The result of the highest-ordered completed step, if any.
    pub fn last_completed_result(&self) -> Option<Value> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.is_completed())
            .and_then(|s| s.result.clone())
    }

    /// Index of the first dependency of step `index` that is not completed.
    ///
    /// Indices at or beyond `index` can never be completed in a forward pass,
    /// so they are reported as unmet just like unknown indices.
    pub fn first_unmet_dependency(&self, index: usize) -> Option<usize> {
        let step = self.steps.get(index)?;
        step.dependencies.iter().copied().find(|&dep| {
            dep >= index || !self.steps.get(dep).map(Step::is_completed).unwrap_or(false)
        })
    }
}
