//! Error types for stepchain.
//!
//! Every workflow failure funnels into a single [`WorkflowError`] so callers
//! have one place to look for the failed phase, the preserved
//! [`WorkflowContext`], and whatever partial output existed when the run
//! stopped. The [`WorkflowErrorKind`] taxonomy distinguishes planner,
//! action, step, and integration failures without multiplying error types.
//!
//! Backend transport problems use the narrower [`QueryError`] and are
//! wrapped into a [`WorkflowError`] by the orchestrator at the phase
//! boundary where they occurred.

use crate::types::{FinishReason, WorkflowContext, WorkflowPhase};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of a workflow failure.
///
/// Serialized as snake_case strings so kinds are stable across persistence
/// and log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "test-utils", derive(strum::VariantNames))]
#[cfg_attr(feature = "test-utils", strum(serialize_all = "snake_case"))]
pub enum WorkflowErrorKind {
    /// The planning model call failed or its response was unusable.
    PlanningRejected,
    /// The planning response parsed but did not describe a valid plan.
    PlanMalformed,
    /// A step requested an action no handler was registered for.
    ActionUnavailable,
    /// A registered action handler returned an error.
    ActionFailed,
    /// A step's model call failed or finished abnormally.
    StepRejected,
    /// The integration model call failed or finished abnormally.
    IntegrationRejected,
}

impl WorkflowErrorKind {
    /// Returns the snake_case string form of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlanningRejected => "planning_rejected",
            Self::PlanMalformed => "plan_malformed",
            Self::ActionUnavailable => "action_unavailable",
            Self::ActionFailed => "action_failed",
            Self::StepRejected => "step_rejected",
            Self::IntegrationRejected => "integration_rejected",
        }
    }
}

impl fmt::Display for WorkflowErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed workflow run.
///
/// Carries everything needed to diagnose the failure and to resume: the
/// phase that failed, a human-readable message, and the full context as it
/// stood when the run stopped. Completed steps stay in the context's
/// execution log, so passing the context back to the orchestrator re-runs
/// only the steps that never finished.
///
/// # Example
///
/// ```rust
/// use stepchain_utils::error::{WorkflowError, WorkflowErrorKind};
/// use stepchain_utils::types::{WorkflowContext, WorkflowPhase};
///
/// let ctx = WorkflowContext::new("objective");
/// let err = WorkflowError::new(
///     WorkflowErrorKind::PlanningRejected,
///     WorkflowPhase::Planning,
///     "backend refused the request",
///     ctx,
/// );
///
/// assert_eq!(err.phase, WorkflowPhase::Planning);
/// assert!(err.to_string().contains("backend refused"));
/// ```
#[derive(Debug, Error)]
#[error("{kind} in {phase} phase: {message}")]
pub struct WorkflowError {
    /// Failure category.
    pub kind: WorkflowErrorKind,
    /// Phase the run was in when it failed.
    pub phase: WorkflowPhase,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Full workflow state at the moment of failure.
    pub context: Box<WorkflowContext>,
    /// Raw text that was produced before the failure, when any existed.
    pub partial_result: Option<String>,
    /// Finish reason from the backend, when the failure came from one.
    pub finish_reason: Option<FinishReason>,
}

impl WorkflowError {
    /// Creates an error preserving the given context.
    #[must_use]
    pub fn new(
        kind: WorkflowErrorKind,
        phase: WorkflowPhase,
        message: impl Into<String>,
        context: WorkflowContext,
    ) -> Self {
        Self {
            kind,
            phase,
            message: message.into(),
            context: Box::new(context),
            partial_result: None,
            finish_reason: None,
        }
    }

    /// Attaches partial output that existed when the run stopped.
    #[must_use]
    pub fn with_partial_result(mut self, partial_result: impl Into<String>) -> Self {
        self.partial_result = Some(partial_result.into());
        self
    }

    /// Attaches the backend finish reason that triggered the failure.
    #[must_use]
    pub const fn with_finish_reason(mut self, finish_reason: FinishReason) -> Self {
        self.finish_reason = Some(finish_reason);
        self
    }

    /// Returns `true` when re-running the preserved context would skip work.
    ///
    /// A context with a plan resumes at the first unlogged step. A context
    /// that failed before planning produced anything starts over, so there
    /// is nothing to resume.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.context.plan.is_some()
    }

    /// Consumes the error, returning the preserved context for a resume.
    #[must_use]
    pub fn into_context(self) -> WorkflowContext {
        *self.context
    }
}

/// A failed call to a query backend.
///
/// These are transport-level failures. In-band failures, where the backend
/// answers but flags the response as unusable, travel through
/// [`FinishReason`] on the response instead.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The backend could not be reached or is not running.
    #[error("query backend unavailable: {reason}")]
    Unavailable {
        /// Why the backend was unreachable.
        reason: String,
    },
    /// The call started but failed partway through.
    #[error("query transport failed: {reason}")]
    Transport {
        /// What broke mid-call.
        reason: String,
    },
    /// The backend replied with something that could not be decoded.
    #[error("malformed query response: {reason}")]
    Malformed {
        /// What was wrong with the payload.
        reason: String,
    },
}

impl QueryError {
    /// Creates an unavailability error.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a mid-call transport error.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Creates a malformed-response error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
