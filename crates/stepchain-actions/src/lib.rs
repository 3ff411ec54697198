//! Action handler registry for stepchain
//!
//! Actions are caller-supplied async side effects a plan step can request
//! by name before its model call. The registry is plain data passed into
//! each run; nothing here is process-global, so independent runs stay
//! fully isolated even when they share handler instances.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use stepchain_utils::types::WorkflowContext;

/// A named external capability a plan step can invoke.
///
/// Handlers are foreign code from the engine's point of view, so they
/// report failures as [`anyhow::Error`]; the orchestrator wraps those into
/// its own error type with the failing action's name attached.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Runs the action with the step's parameters.
    ///
    /// `params` is the step's literal `params` object, or an empty JSON
    /// object when the plan omitted it. The context is read-only: handlers
    /// observe workflow state but never mutate it.
    ///
    /// # Errors
    ///
    /// Any error aborts the in-flight step before its model call.
    async fn call(
        &self,
        params: serde_json::Value,
        context: &WorkflowContext,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Name-to-handler mapping supplied by the caller for one or more runs.
///
/// Cloning a registry is cheap and shares the underlying handlers.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under a name, replacing any previous handler
    /// with the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Builder form of [`ActionRegistry::register`].
    #[must_use]
    pub fn with_handler(mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.register(name, handler);
        self
    }

    /// Looks up a handler by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Returns `true` when a handler is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted so diagnostics are deterministic.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("names", &self.names())
            .finish()
    }
}
