//! Single-step execution.
//!
//! A step runs in a fixed order: every declared action first, then exactly
//! one model call, then the log append. Nothing fallible runs after the
//! append, so a step either leaves a complete log entry or none at all.

use serde_json::Value;
use stepchain_llm::QueryPort;
use stepchain_phase_api::PhaseStrategy;
use stepchain_prompt::PromptModule;
use stepchain_utils::error::WorkflowErrorKind;
use stepchain_utils::logging::preview;
use stepchain_utils::types::{
    CarryOverState, EntryMetadata, ExecutionLogEntry, PlanStep, WorkflowContext, WorkflowPhase,
};
use tracing::{debug, info};

use crate::controller::PhaseFailure;
use crate::options::WorkflowOptions;

/// Executes one plan step against the port, appending its log entry.
///
/// On failure the context keeps `current_step` and any gathered
/// `action_result`, which tells a later inspection exactly where the run
/// stopped. On success both scratch fields are cleared: the entry owns the
/// action result from then on.
pub(crate) async fn run_step(
    strategy: &dyn PhaseStrategy,
    port: &dyn QueryPort,
    user_module: &PromptModule,
    context: &mut WorkflowContext,
    step: &PlanStep,
    options: &WorkflowOptions,
) -> Result<(), PhaseFailure> {
    context.current_step = Some(step.id.clone());
    context.action_result = None;

    run_actions(context, step, options).await?;

    let prompt = strategy
        .build_step_prompt(step, context, user_module)
        .map_err(|e| {
            PhaseFailure::new(
                WorkflowErrorKind::StepRejected,
                format!("step '{}' prompt construction failed: {e:#}", step.id),
            )
        })?;
    debug!(
        target: "stepchain::step",
        step_id = %step.id,
        prompt = %preview(&prompt.text, 200),
        "step prompt compiled"
    );
    let response = port
        .query(prompt, options.query_options_for(WorkflowPhase::Execution))
        .await
        .map_err(|e| {
            PhaseFailure::new(
                WorkflowErrorKind::StepRejected,
                format!("step '{}' query failed: {e}", step.id),
            )
        })?;
    if !response.finish_reason.is_stop() {
        return Err(PhaseFailure::new(
            WorkflowErrorKind::StepRejected,
            format!(
                "step '{}' stopped early with finish reason '{}'",
                step.id, response.finish_reason
            ),
        )
        .with_partial_result(response.content)
        .with_finish_reason(response.finish_reason));
    }

    let extraction =
        strategy.extract_step_result(response.structured_output.as_ref(), &response.content);

    let mut entry = ExecutionLogEntry::new(step.id.clone(), extraction.result);
    if let Some(action_result) = context.action_result.take() {
        entry = entry.with_action_result(action_result);
    }
    if response.usage.is_some() || extraction.next_state.is_some() {
        entry = entry.with_metadata(EntryMetadata {
            usage: response.usage,
            carry_over_note: extraction.next_state.clone(),
        });
    }
    info!(
        target: "stepchain::step",
        step_id = %step.id,
        result = %preview(&entry.result, 120),
        "step completed"
    );
    context.execution_log.push(entry);

    if let Some(next_state) = extraction.next_state {
        let mut carry_over = CarryOverState::new(next_state);
        if let Some(usage) = response.usage {
            carry_over = carry_over.with_usage(usage.total_tokens);
        }
        context.carry_over = Some(carry_over);
    }
    context.current_step = None;
    Ok(())
}

/// Invokes the step's actions in declaration order.
///
/// A single action stores its bare result on the context; several store a
/// JSON array in call order. The slot updates after every invocation, so a
/// later handler can read what earlier ones produced.
async fn run_actions(
    context: &mut WorkflowContext,
    step: &PlanStep,
    options: &WorkflowOptions,
) -> Result<(), PhaseFailure> {
    if step.actions.is_empty() {
        return Ok(());
    }
    let mut gathered: Vec<Value> = Vec::with_capacity(step.actions.len());
    for call in &step.actions {
        let Some(handler) = options.actions.get(&call.tool) else {
            let available = if options.actions.is_empty() {
                "none".to_string()
            } else {
                options.actions.names().join(", ")
            };
            return Err(PhaseFailure::new(
                WorkflowErrorKind::ActionUnavailable,
                format!(
                    "action '{}' is not registered (available: {available})",
                    call.tool
                ),
            ));
        };
        debug!(
            target: "stepchain::step",
            step_id = %step.id,
            action = %call.tool,
            "invoking action"
        );
        let result = handler
            .call(call.params_or_default(), context)
            .await
            .map_err(|e| {
                PhaseFailure::new(
                    WorkflowErrorKind::ActionFailed,
                    format!("action '{}' failed: {e:#}", call.tool),
                )
            })?;
        gathered.push(result);
        context.action_result = Some(if gathered.len() == 1 {
            gathered[0].clone()
        } else {
            Value::Array(gathered.clone())
        });
    }
    Ok(())
}
