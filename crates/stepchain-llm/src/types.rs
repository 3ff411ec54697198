//! Core types for the query port abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use stepchain_prompt::CompiledPrompt;
use stepchain_utils::error::QueryError;
use stepchain_utils::types::{FinishReason, UsageStats, WorkflowPhase};

/// Per-call options passed to a query backend.
///
/// Everything here is advisory: backends are free to ignore knobs they do
/// not support. The orchestrator tags every call with its workflow phase so
/// backends can route or annotate by phase.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Phase the calling workflow is in, when issued by the orchestrator.
    pub workflow_phase: Option<WorkflowPhase>,
    /// Sampling temperature, when the caller wants to pin one.
    pub temperature: Option<f32>,
    /// Output token cap, when the caller wants to pin one.
    pub max_output_tokens: Option<u32>,
    /// Backend-specific metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl QueryOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options tagged with a workflow phase.
    #[must_use]
    pub fn for_phase(phase: WorkflowPhase) -> Self {
        Self {
            workflow_phase: Some(phase),
            ..Self::default()
        }
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the output token cap.
    #[must_use]
    pub const fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Adds backend-specific metadata.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Response from a query backend.
///
/// `structured_output`, when present, is already parsed and validated
/// against the schema the prompt requested. Extracting or repairing JSON
/// out of free text is the backend's job, never the caller's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Raw response text.
    pub content: String,
    /// Parsed structured output, when the backend produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<serde_json::Value>,
    /// How the response ended.
    pub finish_reason: FinishReason,
    /// Token usage for the call, when the backend reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
}

impl QueryResponse {
    /// Creates a normally finished response with no structured output.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            structured_output: None,
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    /// Attaches parsed structured output.
    #[must_use]
    pub fn with_structured_output(mut self, structured_output: serde_json::Value) -> Self {
        self.structured_output = Some(structured_output);
        self
    }

    /// Overrides the finish reason.
    #[must_use]
    pub const fn with_finish_reason(mut self, finish_reason: FinishReason) -> Self {
        self.finish_reason = finish_reason;
        self
    }

    /// Attaches token usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: UsageStats) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Trait for query backend implementations.
///
/// Concrete backends (HTTP providers, local drivers, CLI wrappers) live
/// outside this workspace; the orchestrator depends only on this trait and
/// is handed an implementation per run.
#[async_trait]
pub trait QueryPort: Send + Sync {
    /// Sends one compiled prompt and awaits the response.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` for transport-level failures: unreachable
    /// backend, mid-call breakage, or an undecodable payload. In-band
    /// failures travel through [`QueryResponse::finish_reason`] instead.
    async fn query(
        &self,
        prompt: CompiledPrompt,
        options: QueryOptions,
    ) -> Result<QueryResponse, QueryError>;
}

#[async_trait]
impl<T> QueryPort for Arc<T>
where
    T: QueryPort + ?Sized,
{
    async fn query(
        &self,
        prompt: CompiledPrompt,
        options: QueryOptions,
    ) -> Result<QueryResponse, QueryError> {
        (**self).query(prompt, options).await
    }
}
