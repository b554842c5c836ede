//! Tool definition types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Definition of a tool as presented to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique identifier).
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// JSON Schema for input validation.
    #[serde(default)]
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Create a tool definition.
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Serialized form sent to the model.
    pub fn to_wire_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
