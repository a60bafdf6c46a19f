//! Tool definitions and usage aggregation
//!
//! Requests advertise tools in the OpenAI function-calling shape; messages
//! reference them by name. These helpers back the tools side panel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::Message;

/// A tool advertised in a request's `tools` array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's parameters, kept verbatim
    pub parameters: Value,
}

impl ToolDefinition {
    /// Parse one `tools` entry, skipping entries without a `function` object
    pub fn from_json(entry: &Value) -> Option<ToolDefinition> {
        let function = entry.get("function")?.as_object()?;
        Some(ToolDefinition {
            kind: entry
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("function")
                .to_string(),
            name: function
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or_default()
                .to_string(),
            description: function
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or_default()
                .to_string(),
            parameters: function
                .get("parameters")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
        })
    }
}

/// Distinct tool names used across all messages, in first-appearance order
pub fn used_tool_names(messages: &[Message]) -> Vec<String> {
    let mut names = Vec::new();
    for message in messages {
        for call in &message.tool_calls {
            if !call.name.is_empty() && !names.contains(&call.name) {
                names.push(call.name.clone());
            }
        }
    }
    names
}

/// Number of calls across all messages whose name equals `name` exactly
pub fn tool_usage_count(messages: &[Message], name: &str) -> usize {
    messages
        .iter()
        .flat_map(|m| &m.tool_calls)
        .filter(|call| call.name == name)
        .count()
}
