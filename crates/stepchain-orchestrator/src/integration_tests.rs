//! End-to-end workflow runs against a scripted query port.
//!
//! These tests drive the public [`Orchestrator`] API the way an embedding
//! application would, with every model response queued up front.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use stepchain_actions::{ActionHandler, ActionRegistry};
use stepchain_llm::{QueryResponse, ScriptedPort};
use stepchain_phases::StrategyKind;
use stepchain_prompt::PromptModule;
use stepchain_utils::error::{QueryError, WorkflowErrorKind};
use stepchain_utils::types::{
    ExecutionLogEntry, FinishReason, Plan, PlanStep, UsageStats, WorkflowContext, WorkflowPhase,
};

use crate::{Orchestrator, WorkflowOptions};

fn orchestrator() -> Orchestrator {
    Orchestrator::for_kind(StrategyKind::Structured)
}

fn planning_response(ids: &[&str]) -> QueryResponse {
    let steps: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "description": format!("work on {id}")}))
        .collect();
    QueryResponse::new("planned").with_structured_output(json!({ "steps": steps }))
}

fn step_response(result: &str, next_state: &str) -> QueryResponse {
    QueryResponse::new(result)
        .with_structured_output(json!({"result": result, "nextState": next_state}))
}

struct EchoAction;

#[async_trait]
impl ActionHandler for EchoAction {
    async fn call(&self, params: Value, _context: &WorkflowContext) -> anyhow::Result<Value> {
        Ok(json!({ "echo": params }))
    }
}

struct FailingAction;

#[async_trait]
impl ActionHandler for FailingAction {
    async fn call(&self, _params: Value, _context: &WorkflowContext) -> anyhow::Result<Value> {
        anyhow::bail!("boom")
    }
}

#[tokio::test]
async fn happy_path_executes_plan_then_integrates() {
    let port = ScriptedPort::new();
    port.push_response(planning_response(&["s1", "s2"]));
    port.push_response(step_response("R1", "N1"));
    port.push_response(step_response("R2", "N2"));
    port.push_response(QueryResponse::new("final summary"));

    let result = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("summarize the release"),
            &WorkflowOptions::default(),
        )
        .await
        .expect("workflow should complete");

    assert_eq!(result.output, "final summary");
    assert_eq!(result.metadata.plan_steps, 2);
    assert_eq!(result.metadata.executed_steps, 2);
    assert_eq!(result.metadata.actions_used, 0);
    assert_eq!(result.context.phase, WorkflowPhase::Complete);

    let ids: Vec<&str> = result
        .context
        .execution_log
        .iter()
        .map(|entry| entry.step_id.as_str())
        .collect();
    assert_eq!(ids, ["s1", "s2"]);
    assert_eq!(result.context.execution_log[0].result, "R1");

    let carry_over = result.context.carry_over.expect("final step sets carry-over");
    assert_eq!(carry_over.content, "N2");
    assert!(result.context.current_step.is_none());
    assert!(result.context.action_result.is_none());
    assert_eq!(port.call_count(), 4);
}

#[tokio::test]
async fn queries_carry_their_phase_tag() {
    let port = ScriptedPort::new();
    port.push_response(planning_response(&["s1"]));
    port.push_response(step_response("R1", "N1"));
    port.push_response(QueryResponse::new("done"));

    orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect("workflow should complete");

    let phases: Vec<Option<WorkflowPhase>> = port
        .calls()
        .iter()
        .map(|call| call.workflow_phase)
        .collect();
    assert_eq!(
        phases,
        [
            Some(WorkflowPhase::Planning),
            Some(WorkflowPhase::Execution),
            Some(WorkflowPhase::Integration),
        ]
    );
}

#[tokio::test]
async fn action_failure_stops_the_step_before_its_model_call() {
    let port = ScriptedPort::new();
    port.push_response(QueryResponse::new("planned").with_structured_output(json!({
        "steps": [
            {"id": "s1", "description": "fetch the data", "actions": [{"tool": "fetch"}]}
        ]
    })));

    let options = WorkflowOptions::default()
        .with_actions(ActionRegistry::new().with_handler("fetch", Arc::new(FailingAction)));

    let error = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &options,
        )
        .await
        .expect_err("action failure should abort the run");

    assert_eq!(error.kind, WorkflowErrorKind::ActionFailed);
    assert_eq!(error.phase, WorkflowPhase::Execution);
    let message = error.to_string();
    assert!(message.contains("fetch"), "message names the action: {message}");
    assert!(message.contains("boom"), "message carries the cause: {message}");
    assert!(error.context.execution_log.is_empty());
    assert_eq!(error.context.current_step.as_deref(), Some("s1"));
    // planning was the only model call; the step's never went out
    assert_eq!(port.call_count(), 1);
}

#[tokio::test]
async fn resume_runs_only_unlogged_steps() {
    let port = ScriptedPort::new();
    port.push_response(step_response("R2", "N2"));
    port.push_response(step_response("R3", "N3"));
    port.push_response(QueryResponse::new("stitched"));

    let plan = Plan::new(vec![
        PlanStep::new("s1", "collect input"),
        PlanStep::new("s2", "analyze input"),
        PlanStep::new("s3", "draft output"),
    ]);
    let mut context = WorkflowContext::new("obj").with_plan(plan);
    context.execution_log.push(ExecutionLogEntry::new("s1", "R1"));

    let options = WorkflowOptions::default().enable_planning(false);
    let result = orchestrator()
        .run(&port, &PromptModule::new(), context, &options)
        .await
        .expect("resume should complete");

    // two step calls plus one integration call, no re-planning
    assert_eq!(port.call_count(), 3);
    let ids: Vec<&str> = result
        .context
        .execution_log
        .iter()
        .map(|entry| entry.step_id.as_str())
        .collect();
    assert_eq!(ids, ["s1", "s2", "s3"]);
    assert_eq!(result.context.execution_log[0].result, "R1");
    assert_eq!(result.metadata.executed_steps, 3);

    let calls = port.calls();
    assert!(calls[0].prompt_text.contains("analyze input"));
    assert!(!calls[0].prompt_text.contains("collect input"));
    assert!(calls[0].prompt_text.contains("R1"), "resumed step sees the prior result");
    assert!(calls[1].prompt_text.contains("draft output"));
}

#[tokio::test]
async fn existing_plans_suppress_replanning() {
    let port = ScriptedPort::new();
    port.push_response(step_response("R1", "N1"));
    port.push_response(QueryResponse::new("done"));

    let context = WorkflowContext::new("obj")
        .with_plan(Plan::new(vec![PlanStep::new("s1", "only step")]));

    // planning stays enabled; the supplied plan makes it a no-op
    let result = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            context,
            &WorkflowOptions::default(),
        )
        .await
        .expect("workflow should complete");

    assert_eq!(result.output, "done");
    assert_eq!(port.call_count(), 2);
    assert_eq!(port.calls()[0].workflow_phase, Some(WorkflowPhase::Execution));
}

#[tokio::test]
async fn oversized_plans_lose_their_tail() {
    let port = ScriptedPort::new();
    port.push_response(planning_response(&["s1", "s2", "s3"]));
    port.push_response(step_response("R1", "N1"));
    port.push_response(step_response("R2", "N2"));
    port.push_response(QueryResponse::new("done"));

    let options = WorkflowOptions::default().with_max_steps(2);
    let result = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &options,
        )
        .await
        .expect("workflow should complete");

    assert_eq!(result.metadata.plan_steps, 2);
    assert_eq!(result.metadata.executed_steps, 2);
    let plan = result.context.plan.expect("plan stored on the context");
    assert_eq!(plan.step_ids(), ["s1", "s2"]);
    assert_eq!(port.call_count(), 4);
}

#[tokio::test]
async fn planning_disabled_without_a_plan_is_rejected() {
    let port = ScriptedPort::new();
    let options = WorkflowOptions::default().enable_planning(false);

    let error = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &options,
        )
        .await
        .expect_err("nothing to run without a plan");

    assert_eq!(error.kind, WorkflowErrorKind::PlanningRejected);
    assert_eq!(error.phase, WorkflowPhase::Planning);
    assert!(!error.is_resumable());
    assert_eq!(port.call_count(), 0);
}

#[tokio::test]
async fn planning_disabled_with_a_supplied_plan_runs() {
    let port = ScriptedPort::new();
    port.push_response(step_response("R1", "N1"));
    port.push_response(QueryResponse::new("done"));

    let context = WorkflowContext::new("obj")
        .with_plan(Plan::new(vec![PlanStep::new("s1", "only step")]));
    let options = WorkflowOptions::default().enable_planning(false);

    let result = orchestrator()
        .run(&port, &PromptModule::new(), context, &options)
        .await
        .expect("supplied plan should run");

    assert_eq!(result.output, "done");
    assert_eq!(port.call_count(), 2);
}

#[tokio::test]
async fn prose_planning_output_is_kept_as_partial_result() {
    let port = ScriptedPort::new();
    port.push_response(QueryResponse::new("Here is my plan in prose"));

    let error = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect_err("prose output cannot become a plan");

    assert_eq!(error.kind, WorkflowErrorKind::PlanningRejected);
    assert_eq!(error.phase, WorkflowPhase::Planning);
    assert_eq!(error.partial_result.as_deref(), Some("Here is my plan in prose"));
    assert!(error.context.execution_log.is_empty());
    assert!(!error.is_resumable());
}

#[tokio::test]
async fn non_array_steps_fail_as_malformed() {
    let port = ScriptedPort::new();
    port.push_response(QueryResponse::new("raw").with_structured_output(json!({"steps": "later"})));

    let error = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect_err("steps must be an array");

    assert_eq!(error.kind, WorkflowErrorKind::PlanMalformed);
    assert_eq!(error.phase, WorkflowPhase::Planning);
    assert_eq!(error.partial_result.as_deref(), Some("raw"));
}

#[tokio::test]
async fn truncated_planning_response_reports_its_finish_reason() {
    let port = ScriptedPort::new();
    port.push_response(
        QueryResponse::new("half a plan").with_finish_reason(FinishReason::Length),
    );

    let error = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect_err("truncated planning output is unusable");

    assert_eq!(error.kind, WorkflowErrorKind::PlanningRejected);
    assert_eq!(error.finish_reason, Some(FinishReason::Length));
    assert_eq!(error.partial_result.as_deref(), Some("half a plan"));
}

#[tokio::test]
async fn failed_step_is_resumable_from_the_error_context() {
    let port = ScriptedPort::new();
    port.push_response(planning_response(&["s1", "s2"]));
    port.push_response(step_response("R1", "N1"));
    port.push_response(QueryResponse::new("partial text").with_finish_reason(FinishReason::Error));

    let error = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect_err("second step fails");

    assert_eq!(error.kind, WorkflowErrorKind::StepRejected);
    assert_eq!(error.phase, WorkflowPhase::Execution);
    assert_eq!(error.finish_reason, Some(FinishReason::Error));
    assert_eq!(error.context.execution_log.len(), 1);
    assert!(error.is_resumable());

    let retry_port = ScriptedPort::new();
    retry_port.push_response(step_response("R2", "N2"));
    retry_port.push_response(QueryResponse::new("recovered"));

    let result = orchestrator()
        .run(
            &retry_port,
            &PromptModule::new(),
            error.into_context(),
            &WorkflowOptions::default(),
        )
        .await
        .expect("resume should finish the run");

    assert_eq!(result.output, "recovered");
    assert_eq!(result.metadata.executed_steps, 2);
    assert_eq!(retry_port.call_count(), 2);
}

#[tokio::test]
async fn action_output_reaches_the_step_prompt_and_log() {
    let port = ScriptedPort::new();
    port.push_response(QueryResponse::new("planned").with_structured_output(json!({
        "steps": [{
            "id": "s1",
            "description": "look up the user",
            "actions": [{"tool": "lookup", "params": {"user": "ada"}}]
        }]
    })));
    port.push_response(step_response("R1", "N1"));
    port.push_response(QueryResponse::new("done"));

    let options = WorkflowOptions::default()
        .with_actions(ActionRegistry::new().with_handler("lookup", Arc::new(EchoAction)));

    let result = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &options,
        )
        .await
        .expect("workflow should complete");

    assert_eq!(result.metadata.actions_used, 1);
    let entry = &result.context.execution_log[0];
    let action_result = entry.action_result.as_ref().expect("entry keeps the action result");
    assert_eq!(action_result["echo"]["user"], "ada");

    // the action ran before the model call, so its output is in the prompt
    let step_call = &port.calls()[1];
    assert!(
        step_call.prompt_text.contains("ada"),
        "step prompt includes the action output: {}",
        step_call.prompt_text
    );
}

#[tokio::test]
async fn unregistered_actions_fail_the_step() {
    let port = ScriptedPort::new();
    port.push_response(QueryResponse::new("planned").with_structured_output(json!({
        "steps": [
            {"id": "s1", "description": "deploy it", "actions": [{"tool": "deploy"}]}
        ]
    })));

    let error = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect_err("unknown action must abort");

    assert_eq!(error.kind, WorkflowErrorKind::ActionUnavailable);
    assert_eq!(error.phase, WorkflowPhase::Execution);
    assert!(error.message.contains("deploy"));
    assert!(error.message.contains("not registered"));
    assert_eq!(port.call_count(), 1);
}

#[tokio::test]
async fn prose_step_responses_fall_back_to_raw_content() {
    let port = ScriptedPort::new();
    port.push_response(planning_response(&["s1", "s2"]));
    port.push_response(step_response("R1", "N1"));
    port.push_response(QueryResponse::new("just words, no JSON"));
    port.push_response(QueryResponse::new("done"));

    let result = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect("fallback still completes the step");

    assert_eq!(result.context.execution_log[1].result, "just words, no JSON");
    // the fallback step produced no next state, so s1's carry-over survives
    let carry_over = result.context.carry_over.expect("carry-over from the first step");
    assert_eq!(carry_over.content, "N1");
}

#[tokio::test]
async fn empty_plans_integrate_immediately() {
    let port = ScriptedPort::new();
    port.push_response(QueryResponse::new("planned").with_structured_output(json!({"steps": []})));
    port.push_response(QueryResponse::new("nothing to do"));

    let result = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect("an empty plan is a valid plan");

    assert_eq!(result.output, "nothing to do");
    assert_eq!(result.metadata.plan_steps, 0);
    assert_eq!(result.metadata.executed_steps, 0);
    assert_eq!(port.call_count(), 2);
}

#[tokio::test]
async fn truncated_integration_response_keeps_the_full_log() {
    let port = ScriptedPort::new();
    port.push_response(planning_response(&["s1", "s2"]));
    port.push_response(step_response("R1", "N1"));
    port.push_response(step_response("R2", "N2"));
    port.push_response(
        QueryResponse::new("half a summary").with_finish_reason(FinishReason::Length),
    );

    let error = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect_err("truncated integration output fails the run");

    assert_eq!(error.kind, WorkflowErrorKind::IntegrationRejected);
    assert_eq!(error.phase, WorkflowPhase::Integration);
    assert_eq!(error.finish_reason, Some(FinishReason::Length));
    assert_eq!(error.partial_result.as_deref(), Some("half a summary"));
    // every step stayed logged; a resume would only re-run integration
    assert_eq!(error.context.execution_log.len(), 2);
    assert!(error.is_resumable());
}

#[tokio::test]
async fn transport_failures_are_tagged_with_their_phase() {
    let port = ScriptedPort::new();
    port.push_response(planning_response(&["s1"]));
    port.push_response(step_response("R1", "N1"));
    port.push_error(QueryError::transport("socket closed"));

    let error = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect_err("integration query fails");

    assert_eq!(error.kind, WorkflowErrorKind::IntegrationRejected);
    assert_eq!(error.phase, WorkflowPhase::Integration);
    assert!(error.message.contains("socket closed"));
    assert_eq!(error.context.execution_log.len(), 1);
    assert!(error.is_resumable());
}

#[tokio::test]
async fn token_usage_lands_in_log_metadata_and_carry_over() {
    let port = ScriptedPort::new();
    port.push_response(planning_response(&["s1"]));
    port.push_response(step_response("R1", "N1").with_usage(UsageStats {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }));
    port.push_response(QueryResponse::new("done"));

    let result = orchestrator()
        .run(
            &port,
            &PromptModule::new(),
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect("workflow should complete");

    let entry = &result.context.execution_log[0];
    let metadata = entry.metadata.as_ref().expect("usage recorded on the entry");
    let usage = metadata.usage.expect("usage stats present");
    assert_eq!(usage.total_tokens, 15);
    assert_eq!(metadata.carry_over_note.as_deref(), Some("N1"));

    let carry_over = result.context.carry_over.expect("carry-over present");
    assert_eq!(carry_over.usage, Some(15));
}

#[tokio::test]
async fn caller_prompt_modules_reach_every_phase() {
    let port = ScriptedPort::new();
    port.push_response(planning_response(&["s1"]));
    port.push_response(step_response("R1", "N1"));
    port.push_response(QueryResponse::new("done"));

    let module = PromptModule::new().with_rule("Answer in French");

    orchestrator()
        .run(
            &port,
            &module,
            WorkflowContext::new("obj"),
            &WorkflowOptions::default(),
        )
        .await
        .expect("workflow should complete");

    for call in port.calls() {
        assert!(
            call.prompt_text.contains("Answer in French"),
            "caller rule missing from a prompt: {}",
            call.prompt_text
        );
    }
}
