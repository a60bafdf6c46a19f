//! Error types for capture parsing
//!
//! Every failure in this crate falls into one of three terminal categories.
//! A failed pass returns no partial result; callers are expected to fall back
//! to displaying the raw decoded payload (see [`crate::capture::diagnostic_value`]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parse error for a captured request or response body
///
/// All variants are terminal for the current capture:
/// - Structured variants for the three documented failure modes
/// - Serde support for sending errors to a frontend
/// - Automatic Display implementation via thiserror
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "message")]
pub enum LoupeError {
    /// Bytes are not valid base64/UTF-8/JSON where a full parse was required
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// JSON parsed but lacks a required field (no `messages` array,
    /// no `choices[0].message`, ...)
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Response bytes match neither the single-JSON nor the streaming heuristic
    #[error("Unrecognized response format")]
    UnrecognizedFormat,
}

/// Convert LoupeError to String for frontend bridges that want plain messages
impl From<LoupeError> for String {
    fn from(error: LoupeError) -> String {
        error.to_string()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LoupeError>;
