//! Core workflow types shared by every stepchain crate.
//!
//! Everything in this module is plain data: phases, plans, execution log
//! entries, and the [`WorkflowContext`] that ties them together. All types
//! serialize to JSON so a context can be persisted mid-run and handed back
//! later to resume a workflow.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle phase of a workflow run.
///
/// # Phase Order
///
/// A run moves strictly forward:
///
/// ```text
/// Planning -> Execution -> Integration -> Complete
/// ```
///
/// Resumed runs skip phases that already finished: a context carrying a plan
/// starts in `Execution`, and a context whose log already covers every plan
/// step starts in `Integration`.
///
/// # Serialization
///
/// Phases serialize as lowercase strings (`"planning"`, `"execution"`,
/// `"integration"`, `"complete"`).
///
/// # Example
///
/// ```rust
/// use stepchain_utils::types::WorkflowPhase;
///
/// assert_eq!(WorkflowPhase::Planning.as_str(), "planning");
/// assert!(!WorkflowPhase::Planning.is_terminal());
/// assert!(WorkflowPhase::Complete.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "test-utils", derive(strum::VariantNames))]
#[cfg_attr(feature = "test-utils", strum(serialize_all = "lowercase"))]
pub enum WorkflowPhase {
    /// Producing a step-by-step plan from the objective.
    Planning,
    /// Executing plan steps one at a time.
    Execution,
    /// Merging step results into the final output.
    Integration,
    /// Terminal phase. The workflow finished and produced a result.
    Complete,
}

impl WorkflowPhase {
    /// Returns the lowercase string form of this phase.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Execution => "execution",
            Self::Integration => "integration",
            Self::Complete => "complete",
        }
    }

    /// Returns `true` for the terminal `Complete` phase.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// All phases in lifecycle order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Planning,
            Self::Execution,
            Self::Integration,
            Self::Complete,
        ]
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "execution" => Ok(Self::Execution),
            "integration" => Ok(Self::Integration),
            "complete" => Ok(Self::Complete),
            other => Err(format!("unknown workflow phase: {other}")),
        }
    }
}

/// Why a model response ended.
///
/// Reported by query backends alongside the response text. Anything other
/// than [`FinishReason::Stop`] marks the response as unusable for phase
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "test-utils", derive(strum::VariantNames))]
#[cfg_attr(feature = "test-utils", strum(serialize_all = "lowercase"))]
pub enum FinishReason {
    /// The model completed its response normally.
    Stop,
    /// The response was cut off by an output length limit.
    Length,
    /// The backend reported an in-band failure.
    Error,
}

impl FinishReason {
    /// Returns the lowercase string form of this finish reason.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::Error => "error",
        }
    }

    /// Returns `true` when the response completed normally.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage reported by a query backend for a single call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced in the response.
    pub completion_tokens: u64,
    /// Total tokens for the call.
    pub total_tokens: u64,
}

/// A named action request attached to a plan step.
///
/// The `tool` name is resolved against the handlers registered for the run.
/// `params` is free-form JSON; handlers receive an empty object when the
/// planner omitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Handler name to invoke.
    pub tool: String,
    /// Arguments passed to the handler, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl ToolCall {
    /// Creates a call with no parameters.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: None,
        }
    }

    /// Attaches JSON parameters to the call.
    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Parameters to hand the handler, substituting an empty object when the
    /// plan omitted them.
    #[must_use]
    pub fn params_or_default(&self) -> serde_json::Value {
        self.params
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()))
    }
}

/// Optional per-step behavioral guidance produced during planning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepGuidance {
    /// Things the step should do.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dos: Vec<String>,
    /// Things the step must avoid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub donts: Vec<String>,
}

impl StepGuidance {
    /// Returns `true` when the guidance carries no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dos.is_empty() && self.donts.is_empty()
    }
}

/// One unit of work inside a [`Plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Stable identifier, unique within the plan.
    pub id: String,
    /// What the step is supposed to accomplish.
    pub description: String,
    /// Actions to run before the step's model call, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ToolCall>,
    /// Behavioral guidance for the step, if the planner produced any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<StepGuidance>,
}

impl PlanStep {
    /// Creates a step with no actions and no guidance.
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            actions: Vec::new(),
            guidance: None,
        }
    }

    /// Attaches ordered action requests to the step.
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<ToolCall>) -> Self {
        self.actions = actions;
        self
    }

    /// Attaches behavioral guidance to the step.
    #[must_use]
    pub fn with_guidance(mut self, guidance: StepGuidance) -> Self {
        self.guidance = Some(guidance);
        self
    }
}

/// An ordered list of steps produced by the planning phase.
///
/// Step order is execution order. Step ids are never rewritten after
/// planning, including by [`Plan::truncate_to`], so log entries keep
/// pointing at the right steps across resumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Creates a plan from ordered steps.
    #[must_use]
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// Number of steps in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` when the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Ids of every step, in execution order.
    #[must_use]
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.id.as_str()).collect()
    }

    /// Drops steps past `max_steps`, keeping the head of the plan.
    ///
    /// Surviving steps keep their original ids and descriptions. A plan at or
    /// under the limit is left untouched.
    pub fn truncate_to(&mut self, max_steps: usize) {
        self.steps.truncate(max_steps);
    }
}

/// Per-entry bookkeeping attached to an [`ExecutionLogEntry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Token usage for the step's model call, when the backend reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
    /// Short note about the carry-over the step produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carry_over_note: Option<String>,
}

/// Record of one completed plan step.
///
/// The execution log is append-only: entries are pushed in step order and
/// never rewritten, which is what makes `execution_log.len()` a valid resume
/// cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Id of the plan step this entry records.
    pub step_id: String,
    /// The step's extracted result text.
    pub result: String,
    /// Action output the step's model call saw, if the step ran any actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_result: Option<serde_json::Value>,
    /// Optional bookkeeping for the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntryMetadata>,
}

impl ExecutionLogEntry {
    /// Creates an entry with no action result and no metadata.
    #[must_use]
    pub fn new(step_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            result: result.into(),
            action_result: None,
            metadata: None,
        }
    }

    /// Records the action output the step's model call saw.
    #[must_use]
    pub fn with_action_result(mut self, action_result: serde_json::Value) -> Self {
        self.action_result = Some(action_result);
        self
    }

    /// Attaches bookkeeping metadata to the entry.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Mutable scratch state the most recent step left for the next one.
///
/// Unlike the execution log this is overwritten, not appended: each step's
/// structured response replaces the previous carry-over wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarryOverState {
    /// Free-form state text produced by the step.
    pub content: String,
    /// Cumulative token usage the step reported for itself, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<u64>,
}

impl CarryOverState {
    /// Creates carry-over state from content alone.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    /// Attaches a token usage figure to the state.
    #[must_use]
    pub const fn with_usage(mut self, usage: u64) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Complete state of one workflow run.
///
/// The context is the unit of resumability. Persist it after a failure and
/// pass it back to the orchestrator later: execution picks up at the first
/// plan step without a log entry, and phases that already finished are
/// skipped entirely.
///
/// # Example
///
/// ```rust
/// use stepchain_utils::types::{WorkflowContext, WorkflowPhase};
///
/// let ctx = WorkflowContext::new("summarize the quarterly report")
///     .with_input("quarter", serde_json::json!("Q3"));
///
/// assert_eq!(ctx.phase, WorkflowPhase::Planning);
/// assert_eq!(ctx.executed_steps(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// What the workflow is trying to accomplish.
    pub objective: String,
    /// Caller-supplied named inputs, available to prompt strategies.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub inputs: HashMap<String, serde_json::Value>,
    /// The plan, once planning has produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    /// Append-only record of completed steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub execution_log: Vec<ExecutionLogEntry>,
    /// Scratch state from the most recent step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carry_over: Option<CarryOverState>,
    /// Id of the step currently in flight, cleared once it is logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    /// Action output gathered for the in-flight step, cleared once logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_result: Option<serde_json::Value>,
    /// Phase the run is in.
    pub phase: WorkflowPhase,
}

impl WorkflowContext {
    /// Creates a fresh context in the planning phase.
    #[must_use]
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            inputs: HashMap::new(),
            plan: None,
            execution_log: Vec::new(),
            carry_over: None,
            current_step: None,
            action_result: None,
            phase: WorkflowPhase::Planning,
        }
    }

    /// Adds a named input available to prompt strategies.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    /// Seeds the context with a caller-supplied plan.
    ///
    /// A context that already carries a plan skips the planning phase when
    /// the orchestrator runs it.
    #[must_use]
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Number of steps that have completed and been logged.
    #[must_use]
    pub fn executed_steps(&self) -> usize {
        self.execution_log.len()
    }

    /// Number of plan steps still waiting to run. Zero before planning.
    #[must_use]
    pub fn remaining_steps(&self) -> usize {
        self.plan
            .as_ref()
            .map_or(0, |plan| plan.len().saturating_sub(self.execution_log.len()))
    }

    /// The most recently logged step, if any step has completed.
    #[must_use]
    pub fn latest_entry(&self) -> Option<&ExecutionLogEntry> {
        self.execution_log.last()
    }
}

/// Final-result bookkeeping returned alongside the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Steps the plan contained.
    pub plan_steps: usize,
    /// Steps that actually ran to completion.
    pub executed_steps: usize,
    /// Log entries that recorded an action result.
    pub actions_used: usize,
}

/// Successful outcome of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// The integrated final output.
    pub output: String,
    /// Final context, phase set to [`WorkflowPhase::Complete`].
    pub context: WorkflowContext,
    /// Run bookkeeping.
    pub metadata: WorkflowMetadata,
}
