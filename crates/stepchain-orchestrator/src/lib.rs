//! Execution engine for stepchain workflows
//!
//! This crate drives a workflow through its three phases: planning breaks
//! an objective into steps, execution runs each step (actions first, then
//! one model call), and integration folds the execution log into a single
//! output.
//!
//! # Architecture
//!
//! - **Orchestrator**: owns a phase strategy and runs the state machine
//! - **WorkflowOptions**: per-run settings (step cap, planning toggle,
//!   action registry, query defaults)
//! - **PhaseFailure** (internal): what a phase reports before the workflow
//!   context is attached
//!
//! # Module Organization
//!
//! - `controller.rs`: phase state machine and the planning/integration calls
//! - `step_exec.rs`: single-step execution with action dispatch
//! - `options.rs`: run-scoped settings
//!
//! # Resumability
//!
//! Every error returned from [`Orchestrator::run`] carries the workflow
//! context as it stood at the failure. Feeding that context back into
//! `run` re-executes nothing: steps with a log entry are skipped and the
//! run continues at the first unlogged step.
//!
//! # Example
//!
//! ```rust,no_run
//! use stepchain_llm::QueryPort;
//! use stepchain_orchestrator::{Orchestrator, WorkflowOptions};
//! use stepchain_phases::StrategyKind;
//! use stepchain_prompt::PromptModule;
//! use stepchain_utils::types::WorkflowContext;
//!
//! async fn summarize(port: &dyn QueryPort) -> Result<String, Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::for_kind(StrategyKind::Structured);
//!     let context = WorkflowContext::new("summarize the quarterly report");
//!     let result = orchestrator
//!         .run(port, &PromptModule::new(), context, &WorkflowOptions::default())
//!         .await?;
//!     Ok(result.output)
//! }
//! ```

mod controller;
mod options;
mod step_exec;

#[cfg(test)]
mod integration_tests;

pub use self::controller::Orchestrator;
pub use self::options::{DEFAULT_MAX_STEPS, WorkflowOptions};
