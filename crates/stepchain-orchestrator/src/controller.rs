//! Workflow controller: plans, executes steps, integrates.
//!
//! [`Orchestrator::run`] owns the phase state machine. Phase helpers return
//! [`PhaseFailure`] values describing what went wrong; `run` is the single
//! place that attaches the workflow context and phase tag to produce the
//! final [`WorkflowError`].

use std::time::Instant;

use serde_json::Value;
use stepchain_llm::QueryPort;
use stepchain_phase_api::PhaseStrategy;
use stepchain_phases::{StrategyKind, strategy_for};
use stepchain_prompt::PromptModule;
use stepchain_utils::error::{WorkflowError, WorkflowErrorKind};
use stepchain_utils::logging::{
    log_phase_complete, log_phase_error, log_phase_start, preview, workflow_span,
};
use stepchain_utils::types::{
    FinishReason, Plan, WorkflowContext, WorkflowMetadata, WorkflowPhase, WorkflowResult,
};
use tracing::{Instrument, debug, warn};

use crate::options::WorkflowOptions;
use crate::step_exec::run_step;

/// What a phase helper reports when it fails.
///
/// Helpers cannot build a [`WorkflowError`] themselves because the context
/// still belongs to the caller while the phase runs. They describe the
/// failure and [`Orchestrator::run`] attaches context and phase exactly once.
#[derive(Debug)]
pub(crate) struct PhaseFailure {
    pub(crate) kind: WorkflowErrorKind,
    pub(crate) message: String,
    pub(crate) partial_result: Option<String>,
    pub(crate) finish_reason: Option<FinishReason>,
}

impl PhaseFailure {
    pub(crate) fn new(kind: WorkflowErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            partial_result: None,
            finish_reason: None,
        }
    }

    pub(crate) fn with_partial_result(mut self, partial_result: impl Into<String>) -> Self {
        self.partial_result = Some(partial_result.into());
        self
    }

    pub(crate) const fn with_finish_reason(mut self, finish_reason: FinishReason) -> Self {
        self.finish_reason = Some(finish_reason);
        self
    }

    fn into_error(self, phase: WorkflowPhase, context: WorkflowContext) -> WorkflowError {
        let mut error = WorkflowError::new(self.kind, phase, self.message, context);
        if let Some(partial_result) = self.partial_result {
            error = error.with_partial_result(partial_result);
        }
        if let Some(finish_reason) = self.finish_reason {
            error = error.with_finish_reason(finish_reason);
        }
        error
    }
}

/// Drives workflows from objective to integrated output.
///
/// The orchestrator owns only its phase strategy. Query port, prompt
/// module, context, and options arrive per run, so one instance can serve
/// any number of concurrent workflows.
pub struct Orchestrator {
    strategy: Box<dyn PhaseStrategy>,
}

impl Orchestrator {
    /// Creates an orchestrator around the given strategy.
    #[must_use]
    pub fn new(strategy: Box<dyn PhaseStrategy>) -> Self {
        Self { strategy }
    }

    /// Creates an orchestrator using one of the built-in strategies.
    #[must_use]
    pub fn for_kind(kind: StrategyKind) -> Self {
        Self::new(strategy_for(kind))
    }

    /// Runs a workflow to completion.
    ///
    /// Phases run in order: planning (skipped when the context already
    /// carries a plan), one step execution per unlogged plan step, then
    /// integration. Steps already present in `context.execution_log` are
    /// never re-executed, which is what makes a context recovered from
    /// [`WorkflowError::into_context`] resumable.
    ///
    /// # Errors
    ///
    /// Any phase failure aborts the run. The returned [`WorkflowError`]
    /// carries the context exactly as it stood at the failure, including
    /// every log entry appended before it.
    pub async fn run(
        &self,
        port: &dyn QueryPort,
        user_module: &PromptModule,
        mut context: WorkflowContext,
        options: &WorkflowOptions,
    ) -> Result<WorkflowResult, WorkflowError> {
        if options.enable_planning && context.plan.is_none() {
            context.phase = WorkflowPhase::Planning;
            let started = Instant::now();
            log_phase_start(WorkflowPhase::Planning);
            let span = workflow_span(WorkflowPhase::Planning, &context.objective);
            match self
                .plan_phase(port, user_module, &context, options)
                .instrument(span)
                .await
            {
                Ok(plan) => {
                    log_phase_complete(WorkflowPhase::Planning, started.elapsed().as_millis());
                    context.plan = Some(plan);
                }
                Err(failure) => {
                    log_phase_error(
                        WorkflowPhase::Planning,
                        &failure.message,
                        started.elapsed().as_millis(),
                    );
                    return Err(failure.into_error(WorkflowPhase::Planning, context));
                }
            }
        }

        let Some(plan) = context.plan.clone() else {
            context.phase = WorkflowPhase::Planning;
            let failure = PhaseFailure::new(
                WorkflowErrorKind::PlanningRejected,
                "planning is disabled and the context carries no plan",
            );
            return Err(failure.into_error(WorkflowPhase::Planning, context));
        };
        if plan.is_empty() {
            warn!(
                target: "stepchain::orchestrator",
                "plan has no steps, moving straight to integration"
            );
        }

        context.phase = WorkflowPhase::Execution;
        let executed_already = context.executed_steps();
        if executed_already > 0 {
            debug!(
                target: "stepchain::orchestrator",
                executed = executed_already,
                remaining = context.remaining_steps(),
                "resuming past logged steps"
            );
        }
        let started = Instant::now();
        log_phase_start(WorkflowPhase::Execution);
        let span = workflow_span(WorkflowPhase::Execution, &context.objective);
        for step in plan.steps.iter().skip(executed_already) {
            if let Err(failure) = run_step(
                self.strategy.as_ref(),
                port,
                user_module,
                &mut context,
                step,
                options,
            )
            .instrument(span.clone())
            .await
            {
                log_phase_error(
                    WorkflowPhase::Execution,
                    &failure.message,
                    started.elapsed().as_millis(),
                );
                return Err(failure.into_error(WorkflowPhase::Execution, context));
            }
        }
        log_phase_complete(WorkflowPhase::Execution, started.elapsed().as_millis());

        context.phase = WorkflowPhase::Integration;
        let started = Instant::now();
        log_phase_start(WorkflowPhase::Integration);
        let span = workflow_span(WorkflowPhase::Integration, &context.objective);
        let output = match self
            .integration_phase(port, user_module, &context, options)
            .instrument(span)
            .await
        {
            Ok(output) => {
                log_phase_complete(WorkflowPhase::Integration, started.elapsed().as_millis());
                output
            }
            Err(failure) => {
                log_phase_error(
                    WorkflowPhase::Integration,
                    &failure.message,
                    started.elapsed().as_millis(),
                );
                return Err(failure.into_error(WorkflowPhase::Integration, context));
            }
        };

        context.phase = WorkflowPhase::Complete;
        let metadata = WorkflowMetadata {
            plan_steps: plan.len(),
            executed_steps: context.execution_log.len(),
            actions_used: context
                .execution_log
                .iter()
                .filter(|entry| entry.action_result.is_some())
                .count(),
        };
        Ok(WorkflowResult {
            output,
            context,
            metadata,
        })
    }

    async fn plan_phase(
        &self,
        port: &dyn QueryPort,
        user_module: &PromptModule,
        context: &WorkflowContext,
        options: &WorkflowOptions,
    ) -> Result<Plan, PhaseFailure> {
        let prompt = self
            .strategy
            .build_planning_prompt(context, user_module, options.max_steps)
            .map_err(|e| {
                PhaseFailure::new(
                    WorkflowErrorKind::PlanningRejected,
                    format!("planning prompt construction failed: {e:#}"),
                )
            })?;
        debug!(
            target: "stepchain::orchestrator",
            prompt = %preview(&prompt.text, 200),
            "planning prompt compiled"
        );
        let response = port
            .query(prompt, options.query_options_for(WorkflowPhase::Planning))
            .await
            .map_err(|e| {
                PhaseFailure::new(
                    WorkflowErrorKind::PlanningRejected,
                    format!("planning query failed: {e}"),
                )
            })?;

        if !response.finish_reason.is_stop() {
            return Err(PhaseFailure::new(
                WorkflowErrorKind::PlanningRejected,
                format!(
                    "planning stopped early with finish reason '{}'",
                    response.finish_reason
                ),
            )
            .with_partial_result(response.content)
            .with_finish_reason(response.finish_reason));
        }

        let Some(structured) = response.structured_output else {
            return Err(PhaseFailure::new(
                WorkflowErrorKind::PlanningRejected,
                format!(
                    "planning returned prose instead of a structured plan: {}",
                    preview(&response.content, 120)
                ),
            )
            .with_partial_result(response.content));
        };

        parse_plan(&structured, &response.content, options.max_steps)
    }

    async fn integration_phase(
        &self,
        port: &dyn QueryPort,
        user_module: &PromptModule,
        context: &WorkflowContext,
        options: &WorkflowOptions,
    ) -> Result<String, PhaseFailure> {
        let prompt = self
            .strategy
            .build_integration_prompt(context, user_module)
            .map_err(|e| {
                PhaseFailure::new(
                    WorkflowErrorKind::IntegrationRejected,
                    format!("integration prompt construction failed: {e:#}"),
                )
            })?;
        debug!(
            target: "stepchain::orchestrator",
            prompt = %preview(&prompt.text, 200),
            "integration prompt compiled"
        );
        let response = port
            .query(prompt, options.query_options_for(WorkflowPhase::Integration))
            .await
            .map_err(|e| {
                PhaseFailure::new(
                    WorkflowErrorKind::IntegrationRejected,
                    format!("integration query failed: {e}"),
                )
            })?;
        if !response.finish_reason.is_stop() {
            return Err(PhaseFailure::new(
                WorkflowErrorKind::IntegrationRejected,
                format!(
                    "integration stopped early with finish reason '{}'",
                    response.finish_reason
                ),
            )
            .with_partial_result(response.content)
            .with_finish_reason(response.finish_reason));
        }
        Ok(response.content)
    }
}

/// Checks the minimal plan shape, deserializes, and applies the step cap.
fn parse_plan(
    structured: &Value,
    raw_content: &str,
    max_steps: usize,
) -> Result<Plan, PhaseFailure> {
    if !structured.get("steps").is_some_and(Value::is_array) {
        return Err(PhaseFailure::new(
            WorkflowErrorKind::PlanMalformed,
            format!(
                "structured plan output lacks a `steps` array: {}",
                preview(&structured.to_string(), 120)
            ),
        )
        .with_partial_result(raw_content));
    }
    let mut plan: Plan = serde_json::from_value(structured.clone()).map_err(|e| {
        PhaseFailure::new(
            WorkflowErrorKind::PlanMalformed,
            format!("plan does not deserialize: {e}"),
        )
        .with_partial_result(raw_content)
    })?;
    if plan.len() > max_steps {
        warn!(
            target: "stepchain::orchestrator",
            plan_steps = plan.len(),
            max_steps,
            "plan exceeds the step cap, dropping tail steps"
        );
        plan.truncate_to(max_steps);
    }
    Ok(plan)
}
