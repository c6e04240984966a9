//! Core abstractions for the endpoint toolkit
//!
//! This module provides the error types and transport traits that the
//! dispatcher, registry and hosting service are built on.

pub mod error;
pub mod traits;

// Re-export commonly used types
pub use error::{SendError, SendResult};
pub use traits::{CancelWatch, ResponseSink};
