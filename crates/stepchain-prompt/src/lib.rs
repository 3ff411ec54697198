//! Prompt module composition for stepchain
//!
//! This crate provides the `PromptModule` fragment type, `merge` over
//! fragments, and `compile` from a merged module plus workflow context into
//! a renderable [`CompiledPrompt`].
//!
//! Modules are declarative: an optional intro, ordered titled sections,
//! rules, and an optional JSON output schema. Phase strategies contribute
//! their own fragments and merge the caller's module in behind them, so a
//! phase's output contract always survives the merge.

use serde::{Deserialize, Serialize};
use stepchain_utils::types::WorkflowContext;

/// One titled block of prompt material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSection {
    /// Section heading.
    pub title: String,
    /// Section body, rendered verbatim.
    pub body: String,
}

impl PromptSection {
    /// Creates a section from a heading and body.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A declarative prompt fragment.
///
/// Modules compose via [`merge`]: sections and rules concatenate in merge
/// order, while `intro` and `output_schema` are first-wins, so the module
/// listed first keeps control of the prompt's framing and output contract.
///
/// # Example
///
/// ```rust
/// use stepchain_prompt::{PromptModule, compile, merge};
/// use stepchain_utils::types::WorkflowContext;
///
/// let phase = PromptModule::new()
///     .with_intro("You are planning a workflow.")
///     .with_rule("Keep steps independent.");
/// let user = PromptModule::new().with_section("Domain", "Reports are quarterly.");
///
/// let prompt = compile(&merge([phase, user]), &WorkflowContext::new("summarize Q3"));
/// assert!(prompt.text.contains("You are planning a workflow."));
/// assert!(prompt.text.contains("summarize Q3"));
/// assert!(prompt.text.contains("Reports are quarterly."));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptModule {
    /// Opening framing text, rendered before everything else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    /// Titled sections, rendered in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<PromptSection>,
    /// Behavioral rules, rendered as a bullet list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,
    /// JSON schema the response must match, when the phase wants
    /// structured output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

impl PromptModule {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the opening framing text.
    #[must_use]
    pub fn with_intro(mut self, intro: impl Into<String>) -> Self {
        self.intro = Some(intro.into());
        self
    }

    /// Appends a titled section.
    #[must_use]
    pub fn with_section(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.sections.push(PromptSection::new(title, body));
        self
    }

    /// Appends a behavioral rule.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rules.push(rule.into());
        self
    }

    /// Sets the JSON schema the response must match.
    #[must_use]
    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// Merges modules in order into one.
///
/// Sections and rules concatenate. The first non-empty `intro` and the
/// first `output_schema` win, so earlier modules take precedence over
/// later ones for framing and output contract.
#[must_use]
pub fn merge<I>(modules: I) -> PromptModule
where
    I: IntoIterator<Item = PromptModule>,
{
    let mut merged = PromptModule::new();
    for module in modules {
        if merged.intro.is_none() {
            merged.intro = module.intro;
        }
        merged.sections.extend(module.sections);
        merged.rules.extend(module.rules);
        if merged.output_schema.is_none() {
            merged.output_schema = module.output_schema;
        }
    }
    merged
}

/// A module rendered to sendable text.
///
/// `output_schema` rides along so query backends that support constrained
/// decoding know what shape was requested; backends without that support
/// rely on the schema block already rendered into `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPrompt {
    /// The full prompt text.
    pub text: String,
    /// Schema the response should match, when structured output was
    /// requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

impl CompiledPrompt {
    /// Returns `true` when the prompt asked for structured output.
    #[must_use]
    pub const fn wants_structured_output(&self) -> bool {
        self.output_schema.is_some()
    }
}

/// Compiles a merged module against a workflow context.
///
/// Rendering order is fixed: intro, objective, caller inputs (sorted by key
/// so output is deterministic), the module's sections, rules, and finally
/// the output-format block when a schema is present.
#[must_use]
pub fn compile(module: &PromptModule, context: &WorkflowContext) -> CompiledPrompt {
    let mut text = String::new();

    if let Some(intro) = &module.intro {
        text.push_str(intro);
        text.push_str("\n\n");
    }

    text.push_str("## Objective\n");
    text.push_str(&context.objective);
    text.push_str("\n\n");

    if !context.inputs.is_empty() {
        let mut keys: Vec<&String> = context.inputs.keys().collect();
        keys.sort();

        text.push_str("## Inputs\n");
        for key in keys {
            let rendered = match &context.inputs[key] {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            text.push_str(&format!("- {key}: {rendered}\n"));
        }
        text.push('\n');
    }

    for section in &module.sections {
        text.push_str(&format!("## {}\n{}\n\n", section.title, section.body));
    }

    if !module.rules.is_empty() {
        text.push_str("## Rules\n");
        for rule in &module.rules {
            text.push_str(&format!("- {rule}\n"));
        }
        text.push('\n');
    }

    if let Some(schema) = &module.output_schema {
        let rendered =
            serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        text.push_str("## Output Format\n");
        text.push_str("Respond with a single JSON object matching this schema:\n");
        text.push_str(&rendered);
        text.push('\n');
    }

    CompiledPrompt {
        text: text.trim_end().to_string(),
        output_schema: module.output_schema.clone(),
    }
}
