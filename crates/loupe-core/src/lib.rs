//! Loupe Core Library
//!
//! Core types and utilities for the Loupe LLM traffic inspector.
//! This crate provides the pure Rust components that are independent
//! of any host integration or GUI framework.
//!
//! # Modules
//!
//! - [`capture`] - Base64/UTF-8 decode boundary and capture lifecycle
//! - [`content`] - Polymorphic message content model
//! - [`request`] - Request body normalization
//! - [`response`] - JSON/SSE response reconstruction
//! - [`stats`] - Character/token estimation and badge weights
//! - [`query`] - Message filter language
//! - [`tools`] - Tool definitions and usage aggregation
//! - [`error`] - Error types
//!
//! Every component here is a synchronous, pure transform over a fully
//! available byte buffer or in-memory structure: no I/O, no persistence,
//! no shared mutable state between captures.

pub mod capture;
pub mod content;
pub mod error;
pub mod query;
pub mod request;
pub mod response;
pub mod stats;
pub mod tools;

// Re-export commonly used types
pub use capture::CapturePhase;
pub use content::{ContentPart, ContentValue};
pub use error::{LoupeError, Result};
pub use query::{filter_messages, QueryFilter};
pub use request::{normalize, Message, NormalizedRequest, ToolCallRequest};
pub use response::{
    reconstruct, ReconstructedResponse, ResponseFormat, ToolArguments, ToolCallResult,
    UsageMetadata,
};
pub use stats::{char_badge, estimate, token_badge, BadgeWeight, TextStats};
pub use tools::{tool_usage_count, used_tool_names, ToolDefinition};
