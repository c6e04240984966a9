//! Payload descriptors for binary, file and stream responses.

use std::time::SystemTime;

use tokio::io::{AsyncRead, AsyncSeek};

use super::content_type;

/// Delivery options shared by the binary, file and stream send operations.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Response `Content-Type`.
    pub content_type: String,

    /// When set, the response carries `Content-Disposition: attachment`
    /// with this file name.
    pub file_name: Option<String>,

    /// When set, emitted as a `Last-Modified` header.
    pub last_modified: Option<SystemTime>,

    /// Honor client `Range` headers with partial-content responses.
    /// Only payloads with a known length and random access qualify.
    pub enable_ranges: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            content_type: content_type::APPLICATION_OCTET_STREAM.to_string(),
            file_name: None,
            last_modified: None,
            enable_ranges: false,
        }
    }
}

impl SendOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Default::default()
        }
    }
}

/// Byte streams that additionally support random access.
pub trait SeekableStream: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableStream for T {}

/// An opaque response payload stream.
///
/// Range processing needs to reposition the source, so only the `Seekable`
/// variant can serve partial content; a `Plain` stream always sends the
/// full body, ignoring any `Range` header.
pub enum BodyStream {
    Plain(Box<dyn AsyncRead + Send + Unpin>),
    Seekable(Box<dyn SeekableStream>),
}

impl BodyStream {
    pub fn plain(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        BodyStream::Plain(Box::new(reader))
    }

    pub fn seekable(reader: impl AsyncRead + AsyncSeek + Send + Unpin + 'static) -> Self {
        BodyStream::Seekable(Box::new(reader))
    }
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyStream::Plain(_) => f.write_str("BodyStream::Plain"),
            BodyStream::Seekable(_) => f.write_str("BodyStream::Seekable"),
        }
    }
}
