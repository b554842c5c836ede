//! The pieces assembled into a model call.

use crate::budget::ContentSection;
use ctxwarden_core::{render_transcript, ContentType, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Section names used for the built-in components.
pub mod section {
    pub const SYSTEM_PROMPT: &str = "system_prompt";
    pub const INSTRUCTIONS: &str = "instructions";
    pub const HISTORY: &str = "history";
    pub const MEMORY_INDEX: &str = "memory_index";
    /// Prefix for tool output sections, followed by the tool name.
    pub const TOOL_OUTPUT_PREFIX: &str = "tool_output:";
}

/// Result of a tool call held in the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub name: String,
    pub value: Value,
}

impl ToolOutput {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Strings verbatim, anything else as compact JSON.
    pub fn text(&self) -> String {
        value_text(&self.value)
    }
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Everything that goes into one model call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextComponents {
    pub system_prompt: String,
    pub instructions: String,
    pub history: Vec<Message>,
    pub tool_outputs: Vec<ToolOutput>,
    /// Rendered memory index.
    pub memory_index: String,
    /// Additional caller-defined sections, never compacted.
    pub extra: Vec<ContentSection>,
}

impl ContextComponents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = text.into();
        self
    }

    pub fn with_instructions(mut self, text: impl Into<String>) -> Self {
        self.instructions = text.into();
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_tool_output(mut self, name: impl Into<String>, value: Value) -> Self {
        self.tool_outputs.push(ToolOutput::new(name, value));
        self
    }

    pub fn with_memory_index(mut self, text: impl Into<String>) -> Self {
        self.memory_index = text.into();
        self
    }

    pub fn with_section(mut self, section: ContentSection) -> Self {
        self.extra.push(section);
        self
    }

    /// The history rendered as a transcript.
    pub fn history_text(&self) -> String {
        render_transcript(&self.history)
    }

    /// Flatten into budget sections. Empty components are skipped.
    pub fn sections(&self) -> Vec<ContentSection> {
        let mut sections = Vec::new();
        let mut push = |name: String, text: String, content_type: ContentType| {
            if !text.is_empty() {
                sections.push(ContentSection::new(name, text, content_type));
            }
        };

        push(section::SYSTEM_PROMPT.to_string(), self.system_prompt.clone(), ContentType::Prose);
        push(section::INSTRUCTIONS.to_string(), self.instructions.clone(), ContentType::Prose);
        push(section::HISTORY.to_string(), self.history_text(), ContentType::Mixed);
        for output in &self.tool_outputs {
            push(
                format!("{}{}", section::TOOL_OUTPUT_PREFIX, output.name),
                output.text(),
                ContentType::Code,
            );
        }
        push(section::MEMORY_INDEX.to_string(), self.memory_index.clone(), ContentType::Prose);

        sections.extend(self.extra.iter().filter(|s| !s.text.is_empty()).cloned());
        sections
    }
}
