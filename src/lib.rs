//! stepchain - Phase-based LLM workflow orchestrator with resumable execution
//!
//! This crate decomposes an objective into a plan, executes the plan step by
//! step against a model backend, and integrates the step results into one
//! final output. Every run is resumable: the error type carries the full
//! workflow context, and feeding that context back in re-executes nothing.
//!
//! stepchain is a library. It talks to models through the [`QueryPort`]
//! trait and to tools through [`ActionHandler`], so any backend and any
//! side effect can be plugged in without touching the engine.
//!
//! # Quick Start
//!
//! Add stepchain to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! stepchain = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! Run a workflow against any query port:
//!
//! ```rust,no_run
//! use stepchain::{
//!     Orchestrator, PromptModule, QueryPort, StrategyKind, WorkflowContext, WorkflowOptions,
//! };
//!
//! async fn draft(port: &dyn QueryPort) -> Result<String, Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::for_kind(StrategyKind::Structured);
//!     let result = orchestrator
//!         .run(
//!             port,
//!             &PromptModule::new(),
//!             WorkflowContext::new("draft the changelog for v2"),
//!             &WorkflowOptions::default(),
//!         )
//!         .await?;
//!     Ok(result.output)
//! }
//! ```
//!
//! # Resuming a failed run
//!
//! ```rust,no_run
//! use stepchain::{Orchestrator, PromptModule, QueryPort, StrategyKind, WorkflowOptions};
//!
//! async fn run_with_retry(port: &dyn QueryPort) -> Result<String, Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::for_kind(StrategyKind::Structured);
//!     let module = PromptModule::new();
//!     let options = WorkflowOptions::default();
//!     let context = stepchain::WorkflowContext::new("summarize the incident");
//!
//!     match orchestrator.run(port, &module, context, &options).await {
//!         Ok(result) => Ok(result.output),
//!         Err(error) if error.is_resumable() => {
//!             // completed steps stay in the log; only the rest re-run
//!             let result = orchestrator
//!                 .run(port, &module, error.into_context(), &options)
//!                 .await?;
//!             Ok(result.output)
//!         }
//!         Err(error) => Err(error.into()),
//!     }
//! }
//! ```
//!
//! # Stable Public API
//!
//! - [`Orchestrator`] and [`WorkflowOptions`] - the execution engine
//! - [`WorkflowContext`], [`WorkflowResult`], [`Plan`] - the data model
//! - [`WorkflowError`] and [`WorkflowErrorKind`] - failure taxonomy with
//!   the context attached
//! - [`QueryPort`] - model backend seam
//! - [`ActionHandler`] and [`ActionRegistry`] - tool seam
//! - [`PhaseStrategy`] and [`StrategyKind`] - prompt-shaping seam
//!
//! Internal modules stay reachable via module paths but are marked
//! `#[doc(hidden)]` and are not covered by semver stability guarantees.

// ============================================================================
// Stable Public API - covered by semver guarantees
// ============================================================================

/// Workflow execution engine.
///
/// `Orchestrator` owns a phase strategy and drives planning, step
/// execution, and integration. Construct one per strategy and reuse it
/// across runs; all per-run state travels in [`WorkflowContext`].
pub use stepchain_orchestrator::Orchestrator;

/// Per-run settings: step cap, planning toggle, actions, query defaults.
pub use stepchain_orchestrator::{DEFAULT_MAX_STEPS, WorkflowOptions};

/// The unit of workflow state and resumability.
///
/// A `WorkflowContext` captures everything a run has produced so far. The
/// context inside a [`WorkflowError`] can be fed back into
/// [`Orchestrator::run`] to continue where the failure happened.
pub use stepchain_utils::types::WorkflowContext;

/// Output of a completed run: integrated text, final context, counters.
pub use stepchain_utils::types::{WorkflowMetadata, WorkflowResult};

/// Plan data model produced by the planning phase.
pub use stepchain_utils::types::{Plan, PlanStep, StepGuidance, ToolCall};

/// Execution records appended as steps complete.
pub use stepchain_utils::types::{CarryOverState, EntryMetadata, ExecutionLogEntry};

/// Phase and response vocabulary shared across the crate.
pub use stepchain_utils::types::{FinishReason, UsageStats, WorkflowPhase};

/// Workflow failure with the context as of the failure attached.
///
/// `WorkflowError` never discards work: completed log entries, any partial
/// model output, and the finish reason all travel with it.
pub use stepchain_utils::error::{WorkflowError, WorkflowErrorKind};

/// Transport-level failure reported by query ports.
pub use stepchain_utils::error::QueryError;

/// Model backend seam.
///
/// Implement `QueryPort` to connect stepchain to an actual model API. The
/// orchestrator is backend-agnostic; it only sees compiled prompts and
/// [`QueryResponse`] values.
pub use stepchain_llm::QueryPort;

/// Request options and response shape for query ports.
pub use stepchain_llm::{QueryOptions, QueryResponse};

/// Tool seam: handlers invoked before a step's model call.
pub use stepchain_actions::{ActionHandler, ActionRegistry};

/// Prompt-shaping seam implemented by phase strategies.
pub use stepchain_phase_api::{PhaseStrategy, StepExtraction, extract_step_fields};

/// Built-in strategies and their selector.
pub use stepchain_phases::{
    GenerativeStrategy, GuidedStrategy, StrategyKind, StructuredStrategy, strategy_for,
};

/// Composable prompt fragments merged into each phase prompt.
pub use stepchain_prompt::{CompiledPrompt, PromptModule, PromptSection, compile, merge};

/// Tracing initialization for binaries embedding stepchain.
pub use stepchain_utils::logging::init_tracing;

/// Returns the stepchain version string.
#[must_use]
pub fn stepchain_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// Test support - gated behind the `test-utils` feature
// ============================================================================

/// Scripted query port double for tests of embedding applications.
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub use stepchain_llm::{RecordedCall, ScriptedPort};

// ============================================================================
// Internal modules - accessible but not stable
// ============================================================================

#[doc(hidden)]
pub use stepchain_utils::{error, logging, types};

#[doc(hidden)]
pub use stepchain_prompt as prompt;

#[doc(hidden)]
pub use stepchain_llm as llm;

#[doc(hidden)]
pub use stepchain_phase_api as phase_api;

#[doc(hidden)]
pub use stepchain_phases as phases;
