//! Error types for the Waypoint orchestration core.
//!
//! All fallible operations return `WaypointResult<T>`. Outcomes that are part
//! of normal plan execution (an unmet dependency, a guardrail stop, a failing
//! tool call) are recorded on the `Plan` itself and are not errors here.

use thiserror::Error;

/// The unified error type for the Waypoint crates.
#[derive(Debug, Error)]
pub enum WaypointError {
    /// A plan, rule, or memory id is unknown to the calling agent.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    /// A step, condition, or action has a malformed shape.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// A tool or completion invocation failed.
    #[error("execution failed: {reason}")]
    ExecutionFailure { reason: String },

    /// The keyed store could not read or write a record.
    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    /// A plan status change that the state machine does not permit.
    #[error("invalid plan transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    /// The plan is already being executed by another caller.
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// A configuration value or document is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl WaypointError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Shorthand for a `Validation` error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the Waypoint crates.
pub type WaypointResult<T> = Result<T, WaypointError>;
