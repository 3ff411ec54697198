//! Phase strategy contract for stepchain workflows
//!
//! This crate defines the [`PhaseStrategy`] trait the orchestrator drives
//! and the step-result extraction types shared by every strategy.
//!
//! # Purpose
//!
//! The orchestrator never composes prompt wording itself; it asks its
//! strategy to build one compiled prompt per phase call. Keeping the
//! contract in its own crate lets strategy implementations and the engine
//! evolve independently without circular dependencies.

use anyhow::Result;

use stepchain_prompt::{CompiledPrompt, PromptModule};
use stepchain_utils::types::{PlanStep, WorkflowContext};

/// What one step's model response contributed to the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepExtraction {
    /// The step's result text, recorded in the execution log.
    pub result: String,
    /// Carry-over content for the next step, when the response produced
    /// one. `None` leaves the previous carry-over in place.
    pub next_state: Option<String>,
}

impl StepExtraction {
    /// Creates an extraction with no carry-over.
    #[must_use]
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            next_state: None,
        }
    }

    /// Attaches carry-over content for the next step.
    #[must_use]
    pub fn with_next_state(mut self, next_state: impl Into<String>) -> Self {
        self.next_state = Some(next_state.into());
        self
    }
}

/// Shared structured-vs-raw extraction used by every built-in strategy.
///
/// Prefers the structured output's `result` and `nextState` fields. When
/// structured output is absent, or carries no usable `result`, the raw
/// response text becomes the result and no carry-over is produced, leaving
/// the previous carry-over untouched. Nothing is invented: a response that
/// never stated its next state yields none.
#[must_use]
pub fn extract_step_fields(
    structured: Option<&serde_json::Value>,
    raw_content: &str,
) -> StepExtraction {
    let Some(structured) = structured else {
        return StepExtraction::new(raw_content);
    };

    let result = match structured.get("result") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => return StepExtraction::new(raw_content),
    };

    let next_state = structured
        .get("nextState")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    StepExtraction { result, next_state }
}

/// Prompt-building and result-extraction strategy for one workflow flavor.
///
/// A strategy owns the wording of all three phases. The orchestrator calls
/// each builder with the caller's module so domain material merges into
/// every prompt, and calls [`PhaseStrategy::extract_step_result`] on each
/// step response.
pub trait PhaseStrategy: Send + Sync {
    /// Builds the planning prompt asking for at most `max_steps` steps.
    ///
    /// # Errors
    ///
    /// A failure here fails the planning phase.
    fn build_planning_prompt(
        &self,
        context: &WorkflowContext,
        user_module: &PromptModule,
        max_steps: usize,
    ) -> Result<CompiledPrompt>;

    /// Builds the prompt for one step's model call.
    ///
    /// # Errors
    ///
    /// A failure here fails the execution phase.
    fn build_step_prompt(
        &self,
        step: &PlanStep,
        context: &WorkflowContext,
        user_module: &PromptModule,
    ) -> Result<CompiledPrompt>;

    /// Builds the final integration prompt over the full execution log.
    ///
    /// # Errors
    ///
    /// A failure here fails the integration phase.
    fn build_integration_prompt(
        &self,
        context: &WorkflowContext,
        user_module: &PromptModule,
    ) -> Result<CompiledPrompt>;

    /// Extracts a step's result and carry-over from its model response.
    ///
    /// The default is the shared [`extract_step_fields`] behavior;
    /// strategies override it only when their step schema differs.
    fn extract_step_result(
        &self,
        structured: Option<&serde_json::Value>,
        raw_content: &str,
    ) -> StepExtraction {
        extract_step_fields(structured, raw_content)
    }
}
