//! Example: Embedding stepchain to run a multi-step workflow
//!
//! This example demonstrates how to use stepchain as a library: implementing
//! the `QueryPort` seam, running a full planning/execution/integration
//! workflow, supplying a plan by hand, wiring in an action handler, and
//! resuming a failed run from its preserved context.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example embed_workflow
//! ```
//!
//! # Requirements
//!
//! None. The example ships its own canned query port, so no model backend
//! needs to be configured or reachable.
//!
//! # What This Example Shows
//!
//! 1. Implementing `QueryPort` for a custom backend
//! 2. Running a full workflow with `Orchestrator::run`
//! 3. Supplying a plan up front with planning disabled
//! 4. Registering an `ActionHandler` a plan step can invoke
//! 5. Resuming a failed run with `WorkflowError::into_context`

// Import only from the public API - no internal module paths
use stepchain::{
    ActionHandler, ActionRegistry, CompiledPrompt, Orchestrator, Plan, PlanStep, PromptModule,
    QueryError, QueryOptions, QueryPort, QueryResponse, StrategyKind, ToolCall, WorkflowContext,
    WorkflowOptions, WorkflowPhase,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Deterministic stand-in for a model backend.
///
/// Answers by workflow phase: planning gets a fixed three-step plan,
/// execution gets a structured `result`/`nextState` pair, and integration
/// gets the final summary text. A real implementation would call a model
/// API here instead.
struct CannedPort {
    steps_answered: AtomicU32,
}

impl CannedPort {
    fn new() -> Self {
        Self {
            steps_answered: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl QueryPort for CannedPort {
    async fn query(
        &self,
        _prompt: CompiledPrompt,
        options: QueryOptions,
    ) -> Result<QueryResponse, QueryError> {
        match options.workflow_phase {
            Some(WorkflowPhase::Planning) => Ok(QueryResponse::new("planned")
                .with_structured_output(json!({
                    "steps": [
                        {"id": "s1", "description": "list the changes shipped this release"},
                        {"id": "s2", "description": "group the changes by audience impact"},
                        {"id": "s3", "description": "write a one-paragraph summary"}
                    ]
                }))),
            Some(WorkflowPhase::Execution) => {
                let answered = self.steps_answered.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(QueryResponse::new(format!("step {answered} done"))
                    .with_structured_output(json!({
                        "result": format!("canned outcome of step call {answered}"),
                        "nextState": format!("notes carried out of step call {answered}")
                    })))
            }
            _ => Ok(QueryResponse::new(
                "Release summary: three changes shipped; docs updated for all of them.",
            )),
        }
    }
}

/// Wraps a [`CannedPort`] and fails the first N execution calls.
///
/// Simulates a backend outage mid-run so the resume path can be shown.
struct OutagePort {
    inner: CannedPort,
    failures_left: AtomicU32,
}

impl OutagePort {
    fn failing_once() -> Self {
        Self {
            inner: CannedPort::new(),
            failures_left: AtomicU32::new(1),
        }
    }
}

#[async_trait]
impl QueryPort for OutagePort {
    async fn query(
        &self,
        prompt: CompiledPrompt,
        options: QueryOptions,
    ) -> Result<QueryResponse, QueryError> {
        if options.workflow_phase == Some(WorkflowPhase::Execution)
            && self.failures_left.load(Ordering::SeqCst) > 0
        {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(QueryError::transport("injected outage: connection dropped"));
        }
        self.inner.query(prompt, options).await
    }
}

/// Action handler that serves canned changelog data.
///
/// A real handler would hit a ticket tracker or a git history here; any
/// `anyhow::Error` it returns aborts the step before its model call.
struct ChangelogAction;

#[async_trait]
impl ActionHandler for ChangelogAction {
    async fn call(&self, params: Value, _context: &WorkflowContext) -> anyhow::Result<Value> {
        let release = params["release"].as_str().unwrap_or("unreleased");
        Ok(json!({
            "release": release,
            "entries": ["faster startup", "new export format", "fixed date parsing"]
        }))
    }
}

/// Demonstrates a full workflow run: planning, three steps, integration.
async fn demo_full_run() {
    println!("=== Demo 1: Full Workflow Run ===\n");

    let port = CannedPort::new();
    let orchestrator = Orchestrator::for_kind(StrategyKind::Structured);
    let context = WorkflowContext::new("summarize this release for the newsletter")
        .with_input("audience", json!("existing customers"));

    match orchestrator
        .run(&port, &PromptModule::new(), context, &WorkflowOptions::default())
        .await
    {
        Ok(result) => {
            println!("✓ Workflow completed");
            println!("  Output: {}", result.output);
            println!("  Planned steps:  {}", result.metadata.plan_steps);
            println!("  Executed steps: {}", result.metadata.executed_steps);
            for entry in &result.context.execution_log {
                println!("    - {}: {}", entry.step_id, entry.result);
            }
        }
        Err(e) => {
            println!("✗ Workflow failed: {e}");
        }
    }

    println!();
}

/// Demonstrates a supplied plan with an action, planning disabled.
///
/// The caller decides the steps; the orchestrator only executes and
/// integrates. The first step invokes the `changelog` action, whose output
/// is handed to that step's model call and recorded in the log.
async fn demo_supplied_plan_with_action() {
    println!("=== Demo 2: Supplied Plan With an Action ===\n");

    let plan = Plan::new(vec![
        PlanStep::new("gather", "gather the raw changelog entries").with_actions(vec![
            ToolCall::new("changelog").with_params(json!({"release": "v2.4.0"})),
        ]),
        PlanStep::new("write", "turn the entries into release notes"),
    ]);
    let context = WorkflowContext::new("write the v2.4.0 release notes").with_plan(plan);

    let options = WorkflowOptions::default()
        .enable_planning(false)
        .with_actions(ActionRegistry::new().with_handler("changelog", Arc::new(ChangelogAction)));

    let port = CannedPort::new();
    let orchestrator = Orchestrator::for_kind(StrategyKind::Structured);

    match orchestrator
        .run(&port, &PromptModule::new(), context, &options)
        .await
    {
        Ok(result) => {
            println!("✓ Supplied plan ran without a planning call");
            println!("  Actions used: {}", result.metadata.actions_used);
            if let Some(action_result) = &result.context.execution_log[0].action_result {
                println!("  Action output: {action_result}");
            }
        }
        Err(e) => {
            println!("✗ Workflow failed: {e}");
        }
    }

    println!();
}

/// Demonstrates failing mid-run and resuming from the preserved context.
async fn demo_failure_and_resume() {
    println!("=== Demo 3: Failure and Resume ===\n");

    let port = OutagePort::failing_once();
    let orchestrator = Orchestrator::for_kind(StrategyKind::Structured);
    let context = WorkflowContext::new("summarize this release for the newsletter");

    let error = match orchestrator
        .run(&port, &PromptModule::new(), context, &WorkflowOptions::default())
        .await
    {
        Ok(_) => {
            println!("✗ Expected the injected outage to fail the run");
            return;
        }
        Err(error) => error,
    };

    println!("✓ Run failed as injected");
    println!("  Kind:   {}", error.kind);
    println!("  Phase:  {}", error.phase);
    println!("  Logged steps so far: {}", error.context.execution_log.len());
    println!("  Resumable: {}", error.is_resumable());

    // The preserved context picks up at the first unlogged step. The same
    // port serves the retry; its injected failure is already spent.
    match orchestrator
        .run(
            &port,
            &PromptModule::new(),
            error.into_context(),
            &WorkflowOptions::default(),
        )
        .await
    {
        Ok(result) => {
            println!("✓ Resume completed the run");
            println!("  Output: {}", result.output);
            println!("  Executed steps: {}", result.metadata.executed_steps);
        }
        Err(e) => {
            println!("✗ Resume failed: {e}");
        }
    }

    println!();
}

#[tokio::main]
async fn main() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║        stepchain Embedding Example - Workflow Phases       ║");
    println!("╚════════════════════════════════════════════════════════════╝\n");

    demo_full_run().await;
    demo_supplied_plan_with_action().await;
    demo_failure_and_resume().await;

    println!("=== Example Complete ===");
    println!("\nKey Takeaways:");
    println!("  • Implement QueryPort once; the engine stays backend-agnostic");
    println!("  • Disable planning to run a plan you constructed yourself");
    println!("  • Register ActionHandlers for steps that need external data");
    println!("  • Errors carry the full context; resume with into_context()");
}
