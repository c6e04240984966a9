//! Response dispatch for typed endpoints.
//!
//! This module turns a (payload kind, options) pair into exactly one written
//! HTTP response: JSON bodies, created-at redirects, raw text, status-only
//! replies, validation failure lists, and binary/file/stream payloads with
//! optional byte-range processing.

pub mod body;
pub mod range;
pub mod sender;

pub use body::{BodyStream, SendOptions};
pub use sender::Responder;

/// Standard content types
pub mod content_type {
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const APPLICATION_JSON: &str = "application/json";
    pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
}
