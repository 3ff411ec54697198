//! Scripted query port for tests.
//!
//! [`ScriptedPort`] replays queued responses in order and records every
//! prompt it receives, which is how tests assert on prompt content, count
//! model calls, and simulate backend failures without a live backend.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::{QueryOptions, QueryPort, QueryResponse};
use stepchain_prompt::CompiledPrompt;
use stepchain_utils::error::QueryError;
use stepchain_utils::types::WorkflowPhase;

/// One recorded call to a [`ScriptedPort`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Full text of the prompt the port received.
    pub prompt_text: String,
    /// Whether the prompt requested structured output.
    pub wants_structured_output: bool,
    /// Phase tag carried in the call's options, if any.
    pub workflow_phase: Option<WorkflowPhase>,
}

/// Query port double that replays queued responses.
///
/// Responses are consumed front to back, one per call. A call arriving
/// after the queue is exhausted fails with [`QueryError::Unavailable`],
/// which makes over-calling show up as a test failure instead of a hang.
#[derive(Debug, Default)]
pub struct ScriptedPort {
    responses: Mutex<VecDeque<Result<QueryResponse, QueryError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedPort {
    /// Creates a port with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next unanswered call.
    pub fn push_response(&self, response: QueryResponse) {
        self.responses
            .lock()
            .expect("scripted port mutex poisoned")
            .push_back(Ok(response));
    }

    /// Queues a transport failure for the next unanswered call.
    pub fn push_error(&self, error: QueryError) {
        self.responses
            .lock()
            .expect("scripted port mutex poisoned")
            .push_back(Err(error));
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .expect("scripted port mutex poisoned")
            .clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .expect("scripted port mutex poisoned")
            .len()
    }
}

#[async_trait]
impl QueryPort for ScriptedPort {
    async fn query(
        &self,
        prompt: CompiledPrompt,
        options: QueryOptions,
    ) -> Result<QueryResponse, QueryError> {
        let call_index = {
            let mut calls = self.calls.lock().expect("scripted port mutex poisoned");
            calls.push(RecordedCall {
                prompt_text: prompt.text,
                wants_structured_output: prompt.output_schema.is_some(),
                workflow_phase: options.workflow_phase,
            });
            calls.len()
        };

        self.responses
            .lock()
            .expect("scripted port mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(QueryError::unavailable(format!(
                    "scripted port exhausted: no response queued for call {call_index}"
                )))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(text: &str) -> CompiledPrompt {
        CompiledPrompt {
            text: text.to_string(),
            output_schema: None,
        }
    }

    #[tokio::test]
    async fn test_replays_responses_in_order() {
        let port = ScriptedPort::new();
        port.push_response(QueryResponse::new("first"));
        port.push_response(QueryResponse::new("second"));

        let a = port.query(prompt("one"), QueryOptions::new()).await.unwrap();
        let b = port.query(prompt("two"), QueryOptions::new()).await.unwrap();

        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
    }

    #[tokio::test]
    async fn test_records_prompts_and_phase_tags() {
        let port = ScriptedPort::new();
        port.push_response(QueryResponse::new("ok"));

        port.query(
            prompt("what is the plan?"),
            QueryOptions::for_phase(WorkflowPhase::Planning),
        )
        .await
        .unwrap();

        let calls = port.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt_text, "what is the plan?");
        assert_eq!(calls[0].workflow_phase, Some(WorkflowPhase::Planning));
        assert!(!calls[0].wants_structured_output);
    }

    #[tokio::test]
    async fn test_exhausted_script_fails_the_call() {
        let port = ScriptedPort::new();

        let err = port
            .query(prompt("anyone there?"), QueryOptions::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exhausted"));
        assert_eq!(port.call_count(), 1);
    }

    #[tokio::test]
    async fn test_queued_error_is_returned() {
        let port = ScriptedPort::new();
        port.push_error(QueryError::transport("connection reset"));

        let err = port
            .query(prompt("hello"), QueryOptions::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("connection reset"));
    }
}
