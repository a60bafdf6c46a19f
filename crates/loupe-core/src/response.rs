//! Response reconstruction
//!
//! A captured completion body is either a single JSON object or a
//! server-sent-event delta stream. The streaming case is the interesting
//! one: tool-call arguments arrive as partial JSON-text slices scattered
//! across many chunks, keyed by an integer index, and must be concatenated
//! in chunk order before the whole buffer is parsed. Concatenate-then-parse,
//! never parse-then-merge.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capture;
use crate::content::ContentValue;
use crate::error::{LoupeError, Result};

/// Which branch a captured response body was reconstructed from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Single JSON completion object
    Json,
    /// Server-sent-event delta stream
    Sse,
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::Json => write!(f, "json"),
            ResponseFormat::Sse => write!(f, "sse"),
        }
    }
}

/// Arguments of a reconstructed tool call
///
/// Malformed argument JSON degrades to the raw string instead of failing
/// the whole response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolArguments {
    Parsed(Value),
    Raw(String),
}

/// A complete tool invocation reconstructed from a response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub arguments: ToolArguments,
}

/// Normalized view of a captured response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconstructedResponse {
    /// Accumulated assistant text
    pub content: String,
    /// Tool calls in ascending stream-index order
    pub tool_calls: Vec<ToolCallResult>,
    /// The usage-bearing chunk (streaming) or whole object (single), if any
    pub metadata: Option<Value>,
    pub format: ResponseFormat,
}

/// Usage numbers extracted opportunistically from provider metadata
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageMetadata {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cached_tokens: u64,
    pub cost: f64,
}

impl UsageMetadata {
    /// Pull usage numbers out of a metadata object, if it carries a `usage` field
    pub fn from_metadata(metadata: &Value) -> Option<UsageMetadata> {
        let usage = metadata.get("usage")?;
        Some(UsageMetadata {
            prompt_tokens: u64_field(usage.get("prompt_tokens")),
            completion_tokens: u64_field(usage.get("completion_tokens")),
            cached_tokens: u64_field(
                usage
                    .get("prompt_tokens_details")
                    .and_then(|d| d.get("cached_tokens")),
            ),
            cost: usage.get("cost").and_then(|c| c.as_f64()).unwrap_or(0.0),
        })
    }
}

fn u64_field(value: Option<&Value>) -> u64 {
    value.and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Sniff whether decoded text looks like an SSE stream or a single JSON object
///
/// Returns `None` when neither heuristic applies.
pub fn detect_format(text: &str) -> Option<ResponseFormat> {
    let trimmed = text.trim();
    if trimmed.contains("data:") {
        return Some(ResponseFormat::Sse);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(_)) => Some(ResponseFormat::Json),
        _ => None,
    }
}

/// Reconstruct a normalized response from captured bytes
pub fn reconstruct(raw: &[u8]) -> Result<ReconstructedResponse> {
    let text = capture::decode_text(raw)?;
    match detect_format(&text) {
        Some(ResponseFormat::Sse) => Ok(reconstruct_stream(&text)),
        Some(ResponseFormat::Json) => {
            // detect_format already proved this parses to an object
            let value: Value = serde_json::from_str(text.trim())
                .map_err(|e| LoupeError::MalformedPayload(format!("invalid json: {e}")))?;
            reconstruct_single(value)
        }
        None => Err(LoupeError::UnrecognizedFormat),
    }
}

/// Single-JSON branch: one complete completion object
fn reconstruct_single(value: Value) -> Result<ReconstructedResponse> {
    let message = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| {
            LoupeError::InvalidShape("response has no choices[0].message".to_string())
        })?;

    // The content model, not this branch, interprets string-vs-parts shape
    let content = ContentValue::from_json(message.get("content")).extract_text();

    let tool_calls = match message.get("tool_calls") {
        Some(Value::Array(items)) => items.iter().map(single_tool_call).collect(),
        _ => Vec::new(),
    };

    let metadata = if value.get("usage").is_some() {
        Some(value)
    } else {
        None
    };

    Ok(ReconstructedResponse {
        content,
        tool_calls,
        metadata,
        format: ResponseFormat::Json,
    })
}

fn single_tool_call(tc: &Value) -> ToolCallResult {
    let function = tc.get("function");
    let arguments = match function.and_then(|f| f.get("arguments")) {
        Some(Value::String(s)) => parse_arguments(s),
        // Already structured: use as-is
        Some(other) => ToolArguments::Parsed(other.clone()),
        None => ToolArguments::Parsed(Value::Object(Default::default())),
    };
    ToolCallResult {
        id: tc
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        name: function
            .and_then(|f| f.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string(),
        kind: tc
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("function")
            .to_string(),
        arguments,
    }
}

/// Per-index accumulator for tool-call fragments in a stream
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    kind: String,
    name: String,
    /// Concatenated argument slices, in chunk order
    arguments: String,
}

impl ToolCallAccumulator {
    fn new() -> Self {
        ToolCallAccumulator {
            kind: "function".to_string(),
            ..Default::default()
        }
    }

    fn absorb(&mut self, fragment: &Value) {
        // id/type/name overwrite only when present and non-empty
        if let Some(id) = non_empty_str(fragment.get("id")) {
            self.id = id.to_string();
        }
        if let Some(kind) = non_empty_str(fragment.get("type")) {
            self.kind = kind.to_string();
        }
        let function = fragment.get("function");
        if let Some(name) = non_empty_str(function.and_then(|f| f.get("name"))) {
            self.name = name.to_string();
        }
        // Arguments append; never overwrite
        if let Some(slice) = function.and_then(|f| f.get("arguments")).and_then(|a| a.as_str()) {
            self.arguments.push_str(slice);
        }
    }

    fn finalize(self) -> ToolCallResult {
        let arguments = if self.arguments.is_empty() {
            ToolArguments::Parsed(Value::Object(Default::default()))
        } else {
            parse_arguments(&self.arguments)
        };
        ToolCallResult {
            id: self.id,
            name: self.name,
            kind: self.kind,
            arguments,
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

fn parse_arguments(raw: &str) -> ToolArguments {
    match serde_json::from_str(raw) {
        Ok(value) => ToolArguments::Parsed(value),
        Err(_) => ToolArguments::Raw(raw.to_string()),
    }
}

/// Streaming branch: line-oriented accumulation over `data:` lines
fn reconstruct_stream(text: &str) -> ReconstructedResponse {
    let mut content = String::new();
    let mut metadata: Option<Value> = None;
    let mut accumulators: BTreeMap<u64, ToolCallAccumulator> = BTreeMap::new();

    for line in text.trim().lines() {
        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();
        if payload == "[DONE]" {
            continue;
        }

        // A corrupt chunk must not abort reconstruction of the rest
        let mut chunk: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("skipping unparsable stream chunk: {e}");
                continue;
            }
        };

        if let Some(delta) = chunk
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
        {
            if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
                content.push_str(text);
            }

            if let Some(fragments) = delta.get("tool_calls").and_then(|tc| tc.as_array()) {
                for fragment in fragments {
                    let index = fragment.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
                    accumulators
                        .entry(index)
                        .or_insert_with(ToolCallAccumulator::new)
                        .absorb(fragment);
                }
            }
        }

        // Last usage-bearing chunk wins, in line order. The x_groq shim copies
        // the nested usage up so the two paths are indistinguishable downstream.
        if chunk.get("usage").is_some() {
            metadata = Some(chunk);
        } else if let Some(usage) = chunk
            .get("x_groq")
            .and_then(|x| x.get("usage"))
            .cloned()
        {
            if let Some(obj) = chunk.as_object_mut() {
                obj.insert("usage".to_string(), usage);
            }
            metadata = Some(chunk);
        }
    }

    // BTreeMap iteration gives ascending index order
    let tool_calls = accumulators
        .into_values()
        .map(ToolCallAccumulator::finalize)
        .collect();

    ReconstructedResponse {
        content,
        tool_calls,
        metadata,
        format: ResponseFormat::Sse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sse_body(chunks: &[Value]) -> Vec<u8> {
        let mut body = String::new();
        for chunk in chunks {
            body.push_str("data: ");
            body.push_str(&chunk.to_string());
            body.push('\n');
        }
        body.push_str("data: [DONE]\n");
        body.into_bytes()
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format("data: {\"choices\":[]}\n\ndata: [DONE]"),
            Some(ResponseFormat::Sse)
        );
        assert_eq!(detect_format("{\"choices\":[]}"), Some(ResponseFormat::Json));
        assert_eq!(detect_format("[1,2,3]"), None);
        assert_eq!(detect_format("plain text"), None);
    }

    #[test]
    fn test_single_json_tool_call_arguments_parse() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": "done",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "lookup", "arguments": "{\"a\":1}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 3 }
        });

        let res = reconstruct(body.to_string().as_bytes()).unwrap();
        assert_eq!(res.format, ResponseFormat::Json);
        assert_eq!(res.content, "done");
        assert_eq!(res.tool_calls.len(), 1);
        assert_eq!(res.tool_calls[0].name, "lookup");
        assert_eq!(
            res.tool_calls[0].arguments,
            ToolArguments::Parsed(json!({ "a": 1 }))
        );
        // Metadata is the whole object because it carries usage
        assert_eq!(res.metadata.as_ref().unwrap()["usage"]["prompt_tokens"], 10);
    }

    #[test]
    fn test_single_json_defaults() {
        let body = json!({
            "choices": [{
                "message": {
                    "tool_calls": [
                        { "function": { "name": "x", "arguments": { "pre": "parsed" } } },
                        { "function": { "name": "y" } }
                    ]
                }
            }]
        });

        let res = reconstruct(body.to_string().as_bytes()).unwrap();
        assert_eq!(res.content, "");
        assert_eq!(res.tool_calls[0].kind, "function");
        assert_eq!(res.tool_calls[0].id, "");
        assert_eq!(
            res.tool_calls[0].arguments,
            ToolArguments::Parsed(json!({ "pre": "parsed" }))
        );
        assert_eq!(res.tool_calls[1].arguments, ToolArguments::Parsed(json!({})));
        assert!(res.metadata.is_none());
    }

    #[test]
    fn test_single_json_parts_content_uses_content_model() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": [
                        { "type": "text", "text": "a" },
                        { "type": "image_url", "image_url": "https://x" },
                        { "type": "text", "text": "b" }
                    ]
                }
            }]
        });
        let res = reconstruct(body.to_string().as_bytes()).unwrap();
        assert_eq!(res.content, "ab");
    }

    #[test]
    fn test_single_json_missing_message_is_invalid_shape() {
        let err = reconstruct(br#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, LoupeError::InvalidShape(_)));
    }

    #[test]
    fn test_stream_accumulates_content_in_order() {
        let body = sse_body(&[
            json!({ "choices": [{ "delta": { "content": "Hel" } }] }),
            json!({ "choices": [{ "delta": { "content": "lo" } }] }),
        ]);
        let res = reconstruct(&body).unwrap();
        assert_eq!(res.format, ResponseFormat::Sse);
        assert_eq!(res.content, "Hello");
    }

    #[test]
    fn test_stream_concatenates_argument_fragments_before_parsing() {
        let body = sse_body(&[
            json!({ "choices": [{ "delta": { "tool_calls": [
                { "index": 0, "id": "call_1", "function": { "name": "lookup", "arguments": "{\"x\":" } }
            ] } }] }),
            json!({ "choices": [{ "delta": { "tool_calls": [
                { "index": 0, "function": { "arguments": "1}" } }
            ] } }] }),
        ]);
        let res = reconstruct(&body).unwrap();
        assert_eq!(res.tool_calls.len(), 1);
        assert_eq!(res.tool_calls[0].id, "call_1");
        assert_eq!(res.tool_calls[0].name, "lookup");
        assert_eq!(
            res.tool_calls[0].arguments,
            ToolArguments::Parsed(json!({ "x": 1 }))
        );
    }

    #[test]
    fn test_stream_malformed_arguments_degrade_to_raw() {
        let body = sse_body(&[json!({ "choices": [{ "delta": { "tool_calls": [
            { "index": 0, "function": { "name": "bad", "arguments": "{\"x\": oops" } }
        ] } }] })]);
        let res = reconstruct(&body).unwrap();
        assert_eq!(
            res.tool_calls[0].arguments,
            ToolArguments::Raw("{\"x\": oops".to_string())
        );
    }

    #[test]
    fn test_stream_multiple_indices_emitted_ascending() {
        let body = sse_body(&[
            json!({ "choices": [{ "delta": { "tool_calls": [
                { "index": 1, "function": { "name": "second", "arguments": "{}" } }
            ] } }] }),
            json!({ "choices": [{ "delta": { "tool_calls": [
                { "index": 0, "function": { "name": "first", "arguments": "{}" } }
            ] } }] }),
        ]);
        let res = reconstruct(&body).unwrap();
        assert_eq!(res.tool_calls[0].name, "first");
        assert_eq!(res.tool_calls[1].name, "second");
    }

    #[test]
    fn test_stream_skips_corrupt_chunks() {
        let body = b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\
                     data: {truncated garbage\n\
                     data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\
                     data: [DONE]\n";
        let res = reconstruct(body).unwrap();
        assert_eq!(res.content, "ab");
    }

    #[test]
    fn test_stream_last_usage_chunk_wins() {
        let body = sse_body(&[
            json!({ "choices": [{ "delta": {} }], "usage": { "prompt_tokens": 1 } }),
            json!({ "choices": [{ "delta": {} }], "usage": { "prompt_tokens": 9 } }),
        ]);
        let res = reconstruct(&body).unwrap();
        assert_eq!(res.metadata.unwrap()["usage"]["prompt_tokens"], 9);
    }

    #[test]
    fn test_stream_x_groq_usage_shim() {
        let body = sse_body(&[json!({
            "choices": [{ "delta": {} }],
            "x_groq": { "usage": { "prompt_tokens": 5 } }
        })]);
        let res = reconstruct(&body).unwrap();
        // The nested usage is copied up; downstream cannot tell the paths apart
        assert_eq!(res.metadata.unwrap()["usage"]["prompt_tokens"], 5);
    }

    #[test]
    fn test_unrecognized_format() {
        let err = reconstruct(b"plain text body").unwrap_err();
        assert_eq!(err, LoupeError::UnrecognizedFormat);

        let err = reconstruct(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, LoupeError::MalformedPayload(_)));
    }

    #[test]
    fn test_usage_metadata_extraction() {
        let metadata = json!({
            "usage": {
                "prompt_tokens": 120,
                "completion_tokens": 40,
                "prompt_tokens_details": { "cached_tokens": 80 },
                "cost": 0.00042
            }
        });
        let usage = UsageMetadata::from_metadata(&metadata).unwrap();
        assert_eq!(usage.prompt_tokens, 120);
        assert_eq!(usage.completion_tokens, 40);
        assert_eq!(usage.cached_tokens, 80);
        assert!((usage.cost - 0.00042).abs() < f64::EPSILON);

        // Missing fields default to zero; missing usage yields None
        let usage = UsageMetadata::from_metadata(&json!({ "usage": {} })).unwrap();
        assert_eq!(usage.prompt_tokens, 0);
        assert!(UsageMetadata::from_metadata(&json!({})).is_none());
    }
}
