//! Capture input boundary
//!
//! The host integration layer delivers request/response bodies as
//! base64-encoded byte buffers together with a lifecycle signal. This module
//! owns the decode step and the best-effort raw fallback used when a
//! structured parse fails and the caller still wants something to display.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LoupeError, Result};

/// Lifecycle signal accompanying each capture event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CapturePhase {
    /// A new capture began; any previous view is stale
    Active,
    /// The request body is available
    Request,
    /// The response body is available
    Complete,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturePhase::Active => write!(f, "active"),
            CapturePhase::Request => write!(f, "request"),
            CapturePhase::Complete => write!(f, "complete"),
        }
    }
}

/// Decode a base64-encoded capture body into raw bytes
pub fn decode_body(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| LoupeError::MalformedPayload(format!("invalid base64: {e}")))
}

/// Decode raw capture bytes as UTF-8 text
pub fn decode_text(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(|s| s.to_string())
        .map_err(|e| LoupeError::MalformedPayload(format!("invalid utf-8: {e}")))
}

/// Best-effort raw JSON view of a payload for diagnostic display
///
/// Used after a structured parse fails: the caller shows the raw parsed JSON
/// instead of the normalized view. Returns `None` when even that decode
/// fails, in which case the host shows a generic placeholder.
pub fn diagnostic_value(raw: &[u8]) -> Option<serde_json::Value> {
    let text = std::str::from_utf8(raw).ok()?;
    serde_json::from_str(text).ok()
}
