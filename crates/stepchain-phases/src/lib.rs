//! Built-in phase strategies for stepchain workflows
//!
//! This crate ships the three concrete [`PhaseStrategy`] implementations:
//! `StructuredStrategy` for schema-disciplined plans, `GuidedStrategy` for
//! plans steered by per-step dos and don'ts, and `GenerativeStrategy` for
//! plans whose step descriptions are themselves model-authored
//! instructions. All three share the same engine, schemas, and extraction
//! behavior; only prompt emphasis differs.

use anyhow::Result;
use serde_json::json;

use stepchain_phase_api::PhaseStrategy;
use stepchain_prompt::{CompiledPrompt, PromptModule, compile, merge};
use stepchain_utils::types::{PlanStep, WorkflowContext};

/// Selects one of the built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Schema-disciplined steps with precise action requests.
    #[default]
    Structured,
    /// Steps steered by per-step dos and don'ts guidance.
    Guided,
    /// Steps whose descriptions are self-contained model-authored
    /// instructions.
    Generative,
}

impl StrategyKind {
    /// Parse a strategy name string into a `StrategyKind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy name is not recognized.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "structured" => Ok(Self::Structured),
            "guided" => Ok(Self::Guided),
            "generative" => Ok(Self::Generative),
            _ => Err(format!(
                "Unknown strategy '{s}'. Available strategies: structured, guided, generative"
            )),
        }
    }

    /// Get the strategy name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Guided => "guided",
            Self::Generative => "generative",
        }
    }
}

/// Construct the strategy for a kind.
#[must_use]
pub fn strategy_for(kind: StrategyKind) -> Box<dyn PhaseStrategy> {
    match kind {
        StrategyKind::Structured => Box::new(StructuredStrategy::new()),
        StrategyKind::Guided => Box::new(GuidedStrategy::new()),
        StrategyKind::Generative => Box::new(GenerativeStrategy::new()),
    }
}

/// Schema every planning prompt requests: an object with a `steps` array.
fn planning_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "description": {"type": "string"},
                        "actions": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "tool": {"type": "string"},
                                    "params": {"type": "object"}
                                },
                                "required": ["tool"]
                            }
                        },
                        "guidance": {
                            "type": "object",
                            "properties": {
                                "dos": {"type": "array", "items": {"type": "string"}},
                                "donts": {"type": "array", "items": {"type": "string"}}
                            }
                        }
                    },
                    "required": ["id", "description"]
                }
            }
        },
        "required": ["steps"]
    })
}

/// Schema every step prompt requests.
fn step_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "result": {"type": "string"},
            "nextState": {"type": "string"}
        },
        "required": ["result"]
    })
}

/// Appends the context material a step's model call needs: the most recent
/// prior result, the current working state, and any action output just
/// gathered for this step.
fn with_step_context(mut module: PromptModule, context: &WorkflowContext) -> PromptModule {
    if let Some(entry) = context.latest_entry() {
        module = module.with_section("Previous Step Result", entry.result.clone());
    }
    if let Some(carry_over) = &context.carry_over {
        module = module.with_section("Working State", carry_over.content.clone());
    }
    if let Some(action_result) = &context.action_result {
        let rendered = serde_json::to_string_pretty(action_result)
            .unwrap_or_else(|_| action_result.to_string());
        module = module.with_section("Action Output", rendered);
    }
    module
}

/// Renders guidance as Do/Avoid rules, when the step carries any.
fn with_guidance_rules(mut module: PromptModule, step: &PlanStep) -> PromptModule {
    if let Some(guidance) = &step.guidance {
        for item in &guidance.dos {
            module = module.with_rule(format!("Do: {item}"));
        }
        for item in &guidance.donts {
            module = module.with_rule(format!("Avoid: {item}"));
        }
    }
    module
}

/// Builds the sections presenting the full execution log for integration.
fn with_execution_log(mut module: PromptModule, context: &WorkflowContext) -> PromptModule {
    for entry in &context.execution_log {
        let mut body = entry.result.clone();
        if let Some(action_result) = &entry.action_result {
            body.push_str("\n\nAction output:\n");
            body.push_str(&action_result.to_string());
        }
        module = module.with_section(format!("Step {}", entry.step_id), body);
    }
    if let Some(carry_over) = &context.carry_over {
        module = module.with_section("Final Working State", carry_over.content.clone());
    }
    module
}

/// Strategy for schema-disciplined plans.
///
/// Plans produced under this strategy lean on precise step boundaries and
/// explicit action requests; step execution reports through the fixed
/// `result`/`nextState` schema.
#[derive(Debug, Clone)]
pub struct StructuredStrategy;

impl StructuredStrategy {
    /// Create a new structured strategy instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PhaseStrategy for StructuredStrategy {
    fn build_planning_prompt(
        &self,
        context: &WorkflowContext,
        user_module: &PromptModule,
        max_steps: usize,
    ) -> Result<CompiledPrompt> {
        let module = PromptModule::new()
            .with_intro(
                "You are a planning assistant. Decompose the objective into a short \
                 sequence of discrete, independently executable steps.",
            )
            .with_section(
                "Planning Requirements",
                format!(
                    "Produce 3 to 5 steps when the objective warrants it, and never more \
                     than {max_steps}. Each step must be completable with one model call, \
                     optionally preceded by the actions it names."
                ),
            )
            .with_rule("Give every step a short unique id such as \"s1\".")
            .with_rule("Name an action only when the step needs external data or side effects.")
            .with_rule("Respond with only the JSON object, no surrounding prose.")
            .with_output_schema(planning_schema());

        Ok(compile(&merge([module, user_module.clone()]), context))
    }

    fn build_step_prompt(
        &self,
        step: &PlanStep,
        context: &WorkflowContext,
        user_module: &PromptModule,
    ) -> Result<CompiledPrompt> {
        let mut module = PromptModule::new()
            .with_intro("You are executing one step of a larger plan. Complete only this step.")
            .with_section("Current Step", step.description.clone());
        module = with_step_context(module, context);
        module = with_guidance_rules(module, step);
        module = module
            .with_rule(
                "Report this step's outcome in `result` and the state to carry forward \
                 in `nextState`.",
            )
            .with_output_schema(step_schema());

        Ok(compile(&merge([module, user_module.clone()]), context))
    }

    fn build_integration_prompt(
        &self,
        context: &WorkflowContext,
        user_module: &PromptModule,
    ) -> Result<CompiledPrompt> {
        let mut module = PromptModule::new().with_intro(
            "Every planned step has finished. Synthesize the final answer from the step \
             results below.",
        );
        module = with_execution_log(module, context);
        module = module.with_rule(
            "Answer the objective directly. Do not describe the steps or the process.",
        );

        Ok(compile(&merge([module, user_module.clone()]), context))
    }
}

impl Default for StructuredStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Strategy for guidance-steered plans.
///
/// Identical engine behavior to [`StructuredStrategy`], but planning asks
/// for per-step dos and don'ts and step prompts present that guidance as
/// binding rules.
#[derive(Debug, Clone)]
pub struct GuidedStrategy;

impl GuidedStrategy {
    /// Create a new guided strategy instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PhaseStrategy for GuidedStrategy {
    fn build_planning_prompt(
        &self,
        context: &WorkflowContext,
        user_module: &PromptModule,
        max_steps: usize,
    ) -> Result<CompiledPrompt> {
        let module = PromptModule::new()
            .with_intro(
                "You are a planning assistant. Decompose the objective into a short \
                 sequence of steps, and give each step behavioral guidance: what to do \
                 and what to avoid.",
            )
            .with_section(
                "Planning Requirements",
                format!(
                    "Produce 3 to 5 steps when the objective warrants it, and never more \
                     than {max_steps}. Fill the guidance lists for every step; later \
                     execution treats them as binding."
                ),
            )
            .with_rule("Give every step a short unique id such as \"s1\".")
            .with_rule("Every step needs at least one entry in `guidance.dos`.")
            .with_rule("Respond with only the JSON object, no surrounding prose.")
            .with_output_schema(planning_schema());

        Ok(compile(&merge([module, user_module.clone()]), context))
    }

    fn build_step_prompt(
        &self,
        step: &PlanStep,
        context: &WorkflowContext,
        user_module: &PromptModule,
    ) -> Result<CompiledPrompt> {
        let mut module = PromptModule::new()
            .with_intro(
                "You are executing one step of a larger plan. The guidance rules below \
                 are binding for this step.",
            )
            .with_section("Current Step", step.description.clone());
        module = with_step_context(module, context);
        module = with_guidance_rules(module, step);
        module = module
            .with_rule(
                "Report this step's outcome in `result` and the state to carry forward \
                 in `nextState`.",
            )
            .with_output_schema(step_schema());

        Ok(compile(&merge([module, user_module.clone()]), context))
    }

    fn build_integration_prompt(
        &self,
        context: &WorkflowContext,
        user_module: &PromptModule,
    ) -> Result<CompiledPrompt> {
        let mut module = PromptModule::new().with_intro(
            "Every planned step has finished under its guidance. Synthesize the final \
             answer from the step results below.",
        );
        module = with_execution_log(module, context);
        module = module.with_rule(
            "Answer the objective directly. Do not describe the steps or the process.",
        );

        Ok(compile(&merge([module, user_module.clone()]), context))
    }
}

impl Default for GuidedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Strategy for model-authored step instructions.
///
/// Planning is asked to write each step description as a complete,
/// self-contained instruction; step execution then follows that
/// instruction verbatim instead of re-framing it.
#[derive(Debug, Clone)]
pub struct GenerativeStrategy;

impl GenerativeStrategy {
    /// Create a new generative strategy instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PhaseStrategy for GenerativeStrategy {
    fn build_planning_prompt(
        &self,
        context: &WorkflowContext,
        user_module: &PromptModule,
        max_steps: usize,
    ) -> Result<CompiledPrompt> {
        let module = PromptModule::new()
            .with_intro(
                "You are a planning assistant. Decompose the objective into steps, and \
                 author each step's description as a complete, self-contained \
                 instruction for another model.",
            )
            .with_section(
                "Planning Requirements",
                format!(
                    "Produce 3 to 5 steps when the objective warrants it, and never more \
                     than {max_steps}. Each description must be an imperative instruction \
                     that can be followed without seeing this conversation."
                ),
            )
            .with_rule("Give every step a short unique id such as \"s1\".")
            .with_rule("Write descriptions in the imperative, addressed to the executor.")
            .with_rule("Respond with only the JSON object, no surrounding prose.")
            .with_output_schema(planning_schema());

        Ok(compile(&merge([module, user_module.clone()]), context))
    }

    fn build_step_prompt(
        &self,
        step: &PlanStep,
        context: &WorkflowContext,
        user_module: &PromptModule,
    ) -> Result<CompiledPrompt> {
        let mut module = PromptModule::new()
            .with_intro("Carry out the instruction below exactly as written.")
            .with_section("Instruction", step.description.clone());
        module = with_step_context(module, context);
        module = with_guidance_rules(module, step);
        module = module
            .with_rule(
                "Report this step's outcome in `result` and the state to carry forward \
                 in `nextState`.",
            )
            .with_output_schema(step_schema());

        Ok(compile(&merge([module, user_module.clone()]), context))
    }

    fn build_integration_prompt(
        &self,
        context: &WorkflowContext,
        user_module: &PromptModule,
    ) -> Result<CompiledPrompt> {
        let mut module = PromptModule::new().with_intro(
            "Every planned instruction has been carried out. Synthesize the final \
             answer from the step results below.",
        );
        module = with_execution_log(module, context);
        module = module.with_rule(
            "Answer the objective directly. Do not describe the steps or the process.",
        );

        Ok(compile(&merge([module, user_module.clone()]), context))
    }
}

impl Default for GenerativeStrategy {
    fn default() -> Self {
        Self::new()
    }
}
