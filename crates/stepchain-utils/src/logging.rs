//! Logging infrastructure for stepchain.
//!
//! Structured logging built on `tracing`. The orchestrator emits one span
//! per phase plus start/complete/error events, so a run's progress is
//! reconstructible from log output alone.

use crate::types::WorkflowPhase;
use tracing::{Level, error, info, span};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for structured logging.
///
/// Honors `RUST_LOG` when set; otherwise defaults to debug-level stepchain
/// output in verbose mode and info-level output otherwise.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("stepchain=debug,info")
            } else {
                EnvFilter::try_new("stepchain=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Create a span covering one phase of a workflow run.
///
/// The objective is previewed rather than logged whole, since objectives can
/// be arbitrarily long.
pub fn workflow_span(phase: WorkflowPhase, objective: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "workflow_phase",
        phase = %phase,
        objective = %preview(objective, 80),
    )
}

/// Log the start of a phase.
pub fn log_phase_start(phase: WorkflowPhase) {
    info!(phase = %phase, "phase started");
}

/// Log successful completion of a phase with its duration.
pub fn log_phase_complete(phase: WorkflowPhase, duration_ms: u128) {
    info!(phase = %phase, duration_ms = %duration_ms, "phase completed");
}

/// Log a phase failure with its duration.
pub fn log_phase_error(phase: WorkflowPhase, error: &str, duration_ms: u128) {
    error!(phase = %phase, duration_ms = %duration_ms, error = %error, "phase failed");
}

/// Truncate text for log output, noting the original length.
///
/// Counts characters, not bytes, so multi-byte text never splits mid-char.
/// Text at or under `max_chars` is returned unchanged.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let head: String = text.chars().take(max_chars).collect();
    format!("{head}... ({total} chars total)")
}
