//! Character and token estimation
//!
//! A deliberately crude approximation, not a real tokenizer: CJK ideographs
//! weigh 1.8 tokens, everything else 0.25, summed and rounded half-up. The
//! constants are pinned for behavioral compatibility; do not "improve" them.

use serde::{Deserialize, Serialize};

use crate::request::{Message, NormalizedRequest};
use crate::tools::ToolDefinition;

/// Character and estimated token counts for a piece of text
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextStats {
    pub chars: u64,
    pub tokens: u64,
}

/// Visual weight bucket for a stats badge
///
/// The thresholds are part of this crate's contract even though rendering
/// happens elsewhere: they are derived purely from the estimated numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BadgeWeight {
    Light,
    Medium,
    Dark,
}

const CJK_WEIGHT: f64 = 1.8;
const DEFAULT_WEIGHT: f64 = 0.25;

fn is_cjk(c: char) -> bool {
    // CJK Unified Ideographs
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Estimate character and token counts for a string
///
/// Deterministic and side-effect-free. Chars count Unicode scalars.
pub fn estimate(text: &str) -> TextStats {
    let mut chars = 0u64;
    let mut weight = 0f64;
    for c in text.chars() {
        chars += 1;
        weight += if is_cjk(c) { CJK_WEIGHT } else { DEFAULT_WEIGHT };
    }
    TextStats {
        chars,
        // round() is half-away-from-zero, i.e. 0.5 rounds up
        tokens: weight.round() as u64,
    }
}

/// Estimate over a message's content plus a rendering of its tool calls
///
/// Tool calls render as `name(raw_arguments)` joined by `", "`, separated
/// from the content text by a newline when both are present.
pub fn message_stats(message: &Message) -> TextStats {
    let mut combined = if message.content.has_content() {
        message.content.extract_text()
    } else {
        String::new()
    };

    if !message.tool_calls.is_empty() {
        let rendered = message
            .tool_calls
            .iter()
            .map(|call| format!("{}({})", call.name, call.raw_arguments))
            .collect::<Vec<_>>()
            .join(", ");
        if combined.is_empty() {
            combined = rendered;
        } else {
            combined.push('\n');
            combined.push_str(&rendered);
        }
    }

    estimate(&combined)
}

/// Estimate over a tool's description plus its pretty-printed parameter schema
pub fn tool_stats(tool: &ToolDefinition) -> TextStats {
    let parameters = serde_json::to_string_pretty(&tool.parameters).unwrap_or_default();
    estimate(&format!("{}{}", tool.description, parameters))
}

/// Sum of message stats over all messages plus tool stats over all tools
pub fn total_stats(request: &NormalizedRequest) -> TextStats {
    let mut total = TextStats::default();
    for message in &request.messages {
        let stats = message_stats(message);
        total.chars += stats.chars;
        total.tokens += stats.tokens;
    }
    for tool in &request.tools {
        let stats = tool_stats(tool);
        total.chars += stats.chars;
        total.tokens += stats.tokens;
    }
    total
}

/// Badge weight for a character count
pub fn char_badge(chars: u64) -> BadgeWeight {
    if chars < 500 {
        BadgeWeight::Light
    } else if chars > 2000 {
        BadgeWeight::Dark
    } else {
        BadgeWeight::Medium
    }
}

/// Badge weight for a token count
pub fn token_badge(tokens: u64) -> BadgeWeight {
    if tokens < 300 {
        BadgeWeight::Light
    } else if tokens > 1200 {
        BadgeWeight::Dark
    } else {
        BadgeWeight::Medium
    }
}
