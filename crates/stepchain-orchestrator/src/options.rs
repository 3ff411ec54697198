//! Per-run execution options.

use stepchain_actions::ActionRegistry;
use stepchain_llm::QueryOptions;
use stepchain_utils::types::WorkflowPhase;

/// Plan length cap applied when planning returns more steps than allowed.
pub const DEFAULT_MAX_STEPS: usize = 5;

/// Tunable settings for a single workflow run.
///
/// Options are run-scoped on purpose: one [`Orchestrator`](crate::Orchestrator)
/// can serve runs with different registries, step caps, or query defaults.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Upper bound on plan length. Longer plans lose their tail steps.
    pub max_steps: usize,
    /// When false, the caller must supply `context.plan` up front.
    pub enable_planning: bool,
    /// Handlers the plan's tool calls may name.
    pub actions: ActionRegistry,
    /// Baseline options for every query; the orchestrator stamps the
    /// current phase onto each call.
    pub query_defaults: QueryOptions,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            enable_planning: true,
            actions: ActionRegistry::new(),
            query_defaults: QueryOptions::new(),
        }
    }
}

impl WorkflowOptions {
    /// Creates options with the default step cap and planning enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plan length cap.
    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Turns the planning phase on or off.
    ///
    /// With planning off, a run fails immediately unless the context
    /// already carries a plan.
    #[must_use]
    pub const fn enable_planning(mut self, enable_planning: bool) -> Self {
        self.enable_planning = enable_planning;
        self
    }

    /// Sets the action registry available to plan steps.
    #[must_use]
    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Sets baseline query options shared by every model call.
    #[must_use]
    pub fn with_query_defaults(mut self, query_defaults: QueryOptions) -> Self {
        self.query_defaults = query_defaults;
        self
    }

    /// Clones the query defaults with the given phase stamped on.
    pub(crate) fn query_options_for(&self, phase: WorkflowPhase) -> QueryOptions {
        let mut query_options = self.query_defaults.clone();
        query_options.workflow_phase = Some(phase);
        query_options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let options = WorkflowOptions::default();

        assert_eq!(options.max_steps, DEFAULT_MAX_STEPS);
        assert!(options.enable_planning);
        assert!(options.actions.is_empty());
        assert!(options.query_defaults.workflow_phase.is_none());
    }

    #[test]
    fn test_builders_chain() {
        let options = WorkflowOptions::new()
            .with_max_steps(3)
            .enable_planning(false);

        assert_eq!(options.max_steps, 3);
        assert!(!options.enable_planning);
    }

    #[test]
    fn test_query_options_carry_the_phase_and_defaults() {
        let options = WorkflowOptions::new()
            .with_query_defaults(QueryOptions::new().with_temperature(0.2));

        let query_options = options.query_options_for(WorkflowPhase::Execution);

        assert_eq!(query_options.workflow_phase, Some(WorkflowPhase::Execution));
        assert_eq!(query_options.temperature, Some(0.2));
    }
}
