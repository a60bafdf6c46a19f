//! Request normalization
//!
//! Decodes a captured request body, repairs the top-level `system` field
//! variant some providers use, and produces an ordered list of [`Message`]s
//! with stable indices. Fields this crate does not model (`model`,
//! `temperature`, ...) pass through untouched for metadata display.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::ContentValue;
use crate::error::{LoupeError, Result};
use crate::tools::ToolDefinition;
use crate::capture;

/// A tool invocation as issued by the model inside a request message
///
/// Arguments are kept as an unparsed string: they are displayed verbatim and
/// may not be valid JSON. Consumers parse lazily if they need structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub raw_arguments: String,
}

/// One normalized conversation message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: ContentValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Position in the normalized sequence, assigned once and immutable.
    /// This is the stable identity the presentation layer keys selection
    /// and expansion state on.
    pub original_index: usize,
}

/// Fully normalized view of a captured request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Remaining top-level fields, passed through verbatim
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Normalize a captured request body
///
/// Fails with [`LoupeError::MalformedPayload`] when the bytes are not
/// UTF-8 JSON, and [`LoupeError::InvalidShape`] when the parsed object has
/// no `messages` array.
pub fn normalize(raw: &[u8]) -> Result<NormalizedRequest> {
    let text = capture::decode_text(raw)?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| LoupeError::MalformedPayload(format!("invalid json: {e}")))?;

    let Value::Object(mut fields) = value else {
        return Err(LoupeError::InvalidShape(
            "request body is not a JSON object".to_string(),
        ));
    };

    let raw_messages = match fields.remove("messages") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(LoupeError::InvalidShape(
                "request has no messages array".to_string(),
            ))
        }
    };

    // Top-level `system` is removed regardless of whether it yields a message
    let system_text = fields.remove("system").and_then(|s| extract_system_text(&s));

    let tools = match fields.remove("tools") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(ToolDefinition::from_json)
            .collect(),
        _ => Vec::new(),
    };

    let mut messages = Vec::with_capacity(raw_messages.len() + 1);
    if let Some(text) = system_text {
        messages.push((
            "system".to_string(),
            ContentValue::Plain(text),
            Vec::new(),
        ));
    }
    for msg in &raw_messages {
        messages.push((
            msg.get("role")
                .and_then(|r| r.as_str())
                .unwrap_or_default()
                .to_string(),
            ContentValue::from_json(msg.get("content")),
            parse_tool_calls(msg.get("tool_calls")),
        ));
    }

    let messages = messages
        .into_iter()
        .enumerate()
        .map(|(original_index, (role, content, tool_calls))| Message {
            role,
            content,
            tool_calls,
            original_index,
        })
        .collect();

    Ok(NormalizedRequest {
        messages,
        tools,
        extra: fields,
    })
}

/// Extract text from the top-level `system` field
///
/// A string is used verbatim; an array is joined with newlines over parts
/// that are raw strings or objects exposing a `text` field. Returns `None`
/// when the result is empty after trimming.
fn extract_system_text(system: &Value) -> Option<String> {
    let text = match system {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(obj) => obj.get("text").and_then(|t| t.as_str()),
                    _ => None,
                })
                .collect();
            parts.join("\n")
        }
        _ => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn parse_tool_calls(value: Option<&Value>) -> Vec<ToolCallRequest> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .map(|tc| {
            let function = tc.get("function");
            ToolCallRequest {
                id: str_field(tc.get("id")),
                kind: tc
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("function")
                    .to_string(),
                name: str_field(function.and_then(|f| f.get("name"))),
                raw_arguments: match function.and_then(|f| f.get("arguments")) {
                    Some(Value::String(s)) => s.clone(),
                    // Some providers send arguments pre-parsed; keep the display string
                    Some(other) => serde_json::to_string(other).unwrap_or_default(),
                    None => String::new(),
                },
            }
        })
        .collect()
}

fn str_field(value: Option<&Value>) -> String {
    value
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize_json(value: Value) -> Result<NormalizedRequest> {
        normalize(value.to_string().as_bytes())
    }

    #[test]
    fn test_normalize_assigns_original_index() {
        let req = normalize_json(json!({
            "model": "gpt-4o",
            "messages": [
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "hello" },
            ]
        }))
        .unwrap();

        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].original_index, 0);
        assert_eq!(req.messages[1].original_index, 1);
        assert_eq!(req.messages[1].role, "assistant");
        assert_eq!(req.extra["model"], "gpt-4o");
    }

    #[test]
    fn test_system_array_repair() {
        let req = normalize_json(json!({
            "system": [{ "text": "a" }, { "text": "b" }],
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .unwrap();

        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.messages[0].content, ContentValue::Plain("a\nb".to_string()));
        assert_eq!(req.messages[0].original_index, 0);
        assert_eq!(req.messages[1].original_index, 1);
        // The top-level field is gone from the output
        assert!(!req.extra.contains_key("system"));
    }

    #[test]
    fn test_system_string_and_mixed_array() {
        let req = normalize_json(json!({
            "system": "be terse",
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .unwrap();
        assert_eq!(req.messages[0].content.extract_text(), "be terse");

        let req = normalize_json(json!({
            "system": ["plain", { "text": "tagged" }, 42],
            "messages": []
        }))
        .unwrap();
        assert_eq!(req.messages[0].content.extract_text(), "plain\ntagged");
    }

    #[test]
    fn test_blank_system_produces_no_message() {
        let req = normalize_json(json!({
            "system": "   ",
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .unwrap();
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert!(!req.extra.contains_key("system"));
    }

    #[test]
    fn test_tool_calls_keep_raw_arguments() {
        let req = normalize_json(json!({
            "messages": [{
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "lookup", "arguments": "{\"q\": \"rust\"" }
                }]
            }]
        }))
        .unwrap();

        let call = &req.messages[0].tool_calls[0];
        assert_eq!(call.name, "lookup");
        // Truncated JSON stays verbatim; consumers parse lazily
        assert_eq!(call.raw_arguments, "{\"q\": \"rust\"");
    }

    #[test]
    fn test_structured_arguments_are_stringified() {
        let req = normalize_json(json!({
            "messages": [{
                "role": "assistant",
                "tool_calls": [{
                    "function": { "name": "lookup", "arguments": { "q": 1 } }
                }]
            }]
        }))
        .unwrap();
        assert_eq!(req.messages[0].tool_calls[0].raw_arguments, "{\"q\":1}");
        assert_eq!(req.messages[0].tool_calls[0].kind, "function");
    }

    #[test]
    fn test_tools_parse_leniently() {
        let req = normalize_json(json!({
            "messages": [],
            "tools": [
                {
                    "type": "function",
                    "function": {
                        "name": "lookup",
                        "description": "Search things",
                        "parameters": { "type": "object" }
                    }
                },
                { "type": "mystery" }
            ]
        }))
        .unwrap();
        assert_eq!(req.tools.len(), 1);
        assert_eq!(req.tools[0].name, "lookup");
    }

    #[test]
    fn test_missing_messages_is_invalid_shape() {
        let err = normalize_json(json!({ "model": "gpt-4o" })).unwrap_err();
        assert!(matches!(err, LoupeError::InvalidShape(_)));

        let err = normalize_json(json!({ "messages": "not an array" })).unwrap_err();
        assert!(matches!(err, LoupeError::InvalidShape(_)));
    }

    #[test]
    fn test_malformed_bytes() {
        let err = normalize(b"not json").unwrap_err();
        assert!(matches!(err, LoupeError::MalformedPayload(_)));

        let err = normalize(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, LoupeError::MalformedPayload(_)));
    }
}
