//! Prompt templates generated from field specifications.
//!
//! A template is static instructional text with exactly one
//! `{{recentMessages}}` placeholder. The field list, output shape and
//! supported-value lists are all derived from the same [`FieldSpec`] table
//! the validator checks, so the prose cannot drift from the constraints.

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::context::ConversationContext;
use crate::schema::{Constraint, FieldSpec};

pub const RECENT_MESSAGES_PLACEHOLDER: &str = "{{recentMessages}}";

const DEFAULT_HEADING: &str = "Extract query parameters for making an API call:";
const CONTEXT_LEAD: &str = "Here are the recent user messages for context:";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template must contain exactly one recent-messages placeholder, found {0}")]
    PlaceholderCount(usize),
}

/// Instructional text with a single recent-messages substitution point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Wrap hand-written template text.
    pub fn from_text(text: impl Into<String>) -> Result<Self, TemplateError> {
        let text = text.into();
        match text.matches(RECENT_MESSAGES_PLACEHOLDER).count() {
            1 => Ok(Self { text }),
            n => Err(TemplateError::PlaceholderCount(n)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Fully rendered prompt handed to the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptText(String);

impl PromptText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for PromptText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Substitute the recent messages into the template.
pub fn render(template: &PromptTemplate, context: &ConversationContext) -> PromptText {
    PromptText(
        template
            .text
            .replacen(RECENT_MESSAGES_PLACEHOLDER, &context.recent_messages_text(), 1),
    )
}

/// Builder for a generated template.
#[derive(Debug, Clone)]
pub struct TemplateSpec<'a> {
    heading: &'a str,
    fields: &'a [FieldSpec],
    notes: Vec<&'a str>,
    examples: Vec<(String, Value)>,
}

impl<'a> TemplateSpec<'a> {
    pub fn new(fields: &'a [FieldSpec]) -> Self {
        Self {
            heading: DEFAULT_HEADING,
            fields,
            notes: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn heading(mut self, heading: &'a str) -> Self {
        self.heading = heading;
        self
    }

    pub fn note(mut self, note: &'a str) -> Self {
        self.notes.push(note);
        self
    }

    /// Add a worked example. `title` is the line before the JSON block.
    pub fn example(mut self, title: impl Into<String>, value: Value) -> Self {
        self.examples.push((title.into(), value));
        self
    }

    pub fn examples(&self) -> impl Iterator<Item = &Value> {
        self.examples.iter().map(|(_, value)| value)
    }

    pub fn build(&self) -> PromptTemplate {
        let mut sections = Vec::new();

        let mut field_lines = vec![self.heading.to_string()];
        for spec in self.fields {
            let required = if spec.required { "required" } else { "optional" };
            field_lines.push(format!(
                "- **{}** ({}, {}): {}",
                spec.name,
                spec.kind.as_str(),
                required,
                spec.describe()
            ));
        }
        sections.push(field_lines.join("\n"));

        for spec in self.fields {
            if let Some(Constraint::OneOf(values)) = &spec.constraint {
                let mut lines = vec![format!("Supported {}s:", spec.name)];
                lines.extend(values.iter().map(|v| format!("- {v}")));
                sections.push(lines.join("\n"));
            }
        }

        sections.extend(self.notes.iter().map(|n| n.to_string()));

        sections.push(format!(
            "Provide the details in the following JSON format:\n```json\n{}\n```",
            output_shape(self.fields)
        ));

        for (title, value) in &self.examples {
            sections.push(format!("{title}\n```json\n{}\n```", pretty(value)));
        }

        sections.push(format!("{CONTEXT_LEAD}\n{RECENT_MESSAGES_PLACEHOLDER}"));

        PromptTemplate {
            text: format!("\n{}\n", sections.join("\n\n")),
        }
    }
}

fn output_shape(fields: &[FieldSpec]) -> String {
    let lines: Vec<String> = fields
        .iter()
        .map(|spec| format!("    \"{}\": {}", spec.name, spec.kind.placeholder()))
        .collect();
    format!("{{\n{}\n}}", lines.join(",\n"))
}

fn pretty(value: &Value) -> String {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match value.serialize(&mut ser) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}
