//! Message content model
//!
//! LLM APIs carry message content either as a plain string or as an ordered
//! array of typed parts (text, images, anything else the provider invents).
//! [`ContentValue`] unifies the two behind a tagged variant so downstream
//! code gets exhaustive matching instead of runtime shape inspection.
//!
//! Construction from wire JSON never fails: parts we do not understand
//! degrade to [`ContentPart::Unsupported`] carrying their original type tag
//! for display, and contribute nothing to extracted text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One item of a multi-part message content array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentPart {
    /// Plain text segment
    Text { text: String },
    /// Image reference. A missing or empty URL is a distinct invalid state
    /// from a present one; renderers show a placeholder, not an error.
    Image { url: Option<String> },
    /// Anything else. Keeps the original type tag so the renderer can label it.
    Unsupported { original_kind: String },
}

/// Message content in either of the two provider shapes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentValue {
    /// No content (absent, null, or an empty string on the wire)
    #[default]
    Empty,
    /// Plain string content
    Plain(String),
    /// Ordered sequence of typed parts
    Parts(Vec<ContentPart>),
}

impl ContentValue {
    /// Build a content value from whatever shape the provider sent
    ///
    /// Strings map to [`ContentValue::Plain`], arrays to
    /// [`ContentValue::Parts`], everything else to [`ContentValue::Empty`].
    /// This never errors; malformed parts degrade to `Unsupported`.
    pub fn from_json(value: Option<&Value>) -> ContentValue {
        match value {
            Some(Value::String(s)) if !s.is_empty() => ContentValue::Plain(s.clone()),
            Some(Value::Array(items)) => {
                ContentValue::Parts(items.iter().map(ContentPart::from_json).collect())
            }
            _ => ContentValue::Empty,
        }
    }

    /// Extract the plain-text view of this content
    ///
    /// `Parts` concatenates all text parts in source order with no separator.
    pub fn extract_text(&self) -> String {
        match self {
            ContentValue::Empty => String::new(),
            ContentValue::Plain(text) => text.clone(),
            ContentValue::Parts(items) => items
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Whether the extracted text is non-empty after trimming whitespace
    pub fn has_content(&self) -> bool {
        !self.extract_text().trim().is_empty()
    }

    /// Character count of the extracted text (Unicode scalars, not bytes)
    pub fn char_len(&self) -> usize {
        self.extract_text().chars().count()
    }

    /// Case-insensitive substring test against the extracted text
    pub fn contains_case_insensitive(&self, needle: &str) -> bool {
        self.extract_text()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }
}

impl ContentPart {
    /// Sniff one array item into a typed part
    fn from_json(item: &Value) -> ContentPart {
        let kind = item.get("type").and_then(|t| t.as_str()).unwrap_or("unknown");
        match kind {
            "text" => ContentPart::Text {
                text: item
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string(),
            },
            // OpenAI-style image parts: image_url is either {url: "..."} or a bare string
            "image_url" | "image" => {
                let url = item
                    .get("image_url")
                    .and_then(|iu| iu.get("url").or(Some(iu)))
                    .and_then(|u| u.as_str())
                    .filter(|u| !u.is_empty())
                    .map(|u| u.to_string());
                ContentPart::Image { url }
            }
            other => ContentPart::Unsupported {
                original_kind: other.to_string(),
            },
        }
    }
}
