//! Unified error handling for response dispatch
//!
//! This module provides the central error type shared by the dispatcher,
//! the endpoint registry and the hosting service, so modules never need
//! to depend on each other for error handling.

use std::fmt;

use pingora_error::ErrorType;

/// Unified error types for endpoint response dispatch
#[derive(Debug)]
pub enum SendError {
    /// Response payload could not be serialized
    Serialization(serde_json::Error),

    /// Reverse route lookup failed (unknown endpoint, ambiguous routes,
    /// or a missing template value)
    RouteResolution(String),

    /// File or resource addressed by the response is missing
    NotFound(String),

    /// The request was cancelled before the response completed
    Cancelled,

    /// A response has already been written for this request
    AlreadyWritten,

    /// A header name or value could not be encoded
    InvalidHeader(String),

    /// Endpoint registration and startup errors
    Configuration(String),

    /// I/O errors while reading response payloads
    Io(std::io::Error),

    /// Transport errors from the underlying session
    Transport(Box<pingora_error::Error>),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Serialization(err) => write!(f, "Serialization error: {err}"),
            SendError::RouteResolution(msg) => write!(f, "Route resolution failed: {msg}"),
            SendError::NotFound(msg) => write!(f, "Resource not found: {msg}"),
            SendError::Cancelled => write!(f, "Request cancelled"),
            SendError::AlreadyWritten => write!(f, "Response already written"),
            SendError::InvalidHeader(msg) => write!(f, "Invalid header: {msg}"),
            SendError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            SendError::Io(err) => write!(f, "I/O error: {err}"),
            SendError::Transport(err) => write!(f, "Transport error: {err}"),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SendError::Serialization(err) => Some(err),
            SendError::Io(err) => Some(err),
            SendError::Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

// Error conversions
impl From<serde_json::Error> for SendError {
    fn from(err: serde_json::Error) -> Self {
        SendError::Serialization(err)
    }
}

impl From<std::io::Error> for SendError {
    fn from(err: std::io::Error) -> Self {
        SendError::Io(err)
    }
}

impl From<Box<pingora_error::Error>> for SendError {
    fn from(err: Box<pingora_error::Error>) -> Self {
        SendError::Transport(err)
    }
}

impl From<SendError> for Box<pingora_error::Error> {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Transport(pingora_err) => pingora_err,
            _ => pingora_error::Error::explain(ErrorType::InternalError, err.to_string()),
        }
    }
}

/// Result type alias for dispatch operations
pub type SendResult<T> = std::result::Result<T, SendError>;

/// Convenience macro for registration/startup error creation
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::SendError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::SendError::Configuration(format!($fmt, $($arg)*))
    };
}
