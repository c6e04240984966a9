//! Core traits for response delivery
//!
//! This module defines the transport seam between the dispatcher and the
//! host framework, so dispatch semantics stay testable without a live
//! connection.

use async_trait::async_trait;
use bytes::Bytes;
use pingora_http::ResponseHeader;

use super::error::SendResult;

/// Cancellation signal observed by dispatch operations.
///
/// Same shape as pingora's `ShutdownWatch`; the hosting service passes its
/// shutdown watch through, callers may wire any watch channel instead.
pub type CancelWatch = tokio::sync::watch::Receiver<bool>;

/// Transport seam for writing one HTTP response.
///
/// The production implementation wraps a pingora `ServerSession`; tests use
/// an in-memory recorder. Implementations must not buffer across `end`.
#[async_trait]
pub trait ResponseSink: Send {
    /// Write the response header. `end` marks a bodyless response.
    async fn send_header(&mut self, header: ResponseHeader, end: bool) -> SendResult<()>;

    /// Write one chunk of the response body. `end` marks the final chunk.
    async fn send_body(&mut self, chunk: Bytes, end: bool) -> SendResult<()>;
}
