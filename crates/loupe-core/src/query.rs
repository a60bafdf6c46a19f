//! Message query language
//!
//! A query is either structured (`role:user tool:lookup content:hello`,
//! evaluated as an AND of whichever rules are present) or fuzzy (no
//! recognized prefix: a case-insensitive substring search across role,
//! content, and tool surfaces, OR-ed).
//!
//! Structured `tool:` requires exact name equality; fuzzy matches tool names
//! by substring. The asymmetry is intentional and load-bearing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::request::Message;

static ROLE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)role:\s*(\w+)").unwrap());
static TOOL_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)tool:\s*(\S+)").unwrap());
static CONTENT_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)content:\s*(.+)").unwrap());

/// A parsed message filter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueryFilter {
    /// Blank query: no filtering
    Empty,
    /// Prefixed rules, AND-ed over whichever are present
    Structured {
        role: Option<String>,
        tool: Option<String>,
        content: Option<String>,
    },
    /// Unprefixed query: substring search across all surfaces
    Fuzzy { term: String },
}

impl QueryFilter {
    /// Parse a raw query string
    pub fn parse(raw: &str) -> QueryFilter {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return QueryFilter::Empty;
        }

        let role = ROLE_RULE
            .captures(trimmed)
            .map(|c| c[1].to_lowercase());
        let tool = TOOL_RULE.captures(trimmed).map(|c| c[1].to_string());
        let content = CONTENT_RULE
            .captures(trimmed)
            .map(|c| c[1].trim().to_string());

        if role.is_some() || tool.is_some() || content.is_some() {
            QueryFilter::Structured { role, tool, content }
        } else {
            QueryFilter::Fuzzy {
                term: trimmed.to_lowercase(),
            }
        }
    }

    /// Whether a single message passes this filter
    pub fn matches(&self, message: &Message) -> bool {
        match self {
            QueryFilter::Empty => true,
            QueryFilter::Structured { role, tool, content } => {
                if let Some(role) = role {
                    // role is already lower-cased at parse time
                    if message.role.to_lowercase() != *role {
                        return false;
                    }
                }
                if let Some(tool) = tool {
                    // Exact equality, case-sensitive (unlike fuzzy)
                    if !message.tool_calls.iter().any(|call| &call.name == tool) {
                        return false;
                    }
                }
                if let Some(content) = content {
                    if !message.content.contains_case_insensitive(content) {
                        return false;
                    }
                }
                true
            }
            QueryFilter::Fuzzy { term } => {
                if message.role.to_lowercase().contains(term) {
                    return true;
                }
                if message.content.contains_case_insensitive(term) {
                    return true;
                }
                message.tool_calls.iter().any(|call| {
                    call.name.to_lowercase().contains(term)
                        || call.raw_arguments.to_lowercase().contains(term)
                })
            }
        }
    }
}

/// Apply a filter to a message list, preserving relative order
pub fn filter_messages(messages: &[Message], filter: &QueryFilter) -> Vec<Message> {
    if matches!(filter, QueryFilter::Empty) {
        return messages.to_vec();
    }
    messages
        .iter()
        .filter(|m| filter.matches(m))
        .cloned()
        .collect()
}
