//! In-memory response sink for exercising dispatch without a live session.
//!
//! `CaptureSink` records everything a `Responder` writes; the cloneable
//! `CaptureHandle` reads it back for assertions.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use pingora_http::ResponseHeader;

use crate::core::{ResponseSink, SendResult};

/// Everything written to a `CaptureSink`.
#[derive(Debug, Clone, Default)]
pub struct RecordedResponse {
    pub status: Option<StatusCode>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub ended: bool,
}

/// A `ResponseSink` that records the response in memory.
#[derive(Default)]
pub struct CaptureSink {
    inner: Arc<Mutex<RecordedResponse>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for inspecting the recorded response after dispatch.
    pub fn handle(&self) -> CaptureHandle {
        CaptureHandle {
            inner: self.inner.clone(),
        }
    }
}

#[async_trait]
impl ResponseSink for CaptureSink {
    async fn send_header(&mut self, header: ResponseHeader, end: bool) -> SendResult<()> {
        let mut recorded = lock(&self.inner);
        recorded.status = Some(header.status);
        for (name, value) in header.headers.iter() {
            recorded.headers.push((
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).to_string(),
            ));
        }
        if end {
            recorded.ended = true;
        }
        Ok(())
    }

    async fn send_body(&mut self, chunk: Bytes, end: bool) -> SendResult<()> {
        let mut recorded = lock(&self.inner);
        recorded.body.extend_from_slice(&chunk);
        if end {
            recorded.ended = true;
        }
        Ok(())
    }
}

/// Read side of a `CaptureSink`.
#[derive(Clone)]
pub struct CaptureHandle {
    inner: Arc<Mutex<RecordedResponse>>,
}

impl CaptureHandle {
    pub fn snapshot(&self) -> RecordedResponse {
        lock(&self.inner).clone()
    }

    pub fn status(&self) -> Option<StatusCode> {
        lock(&self.inner).status
    }

    /// First value recorded for a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        lock(&self.inner)
            .headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    pub fn body(&self) -> Vec<u8> {
        lock(&self.inner).body.clone()
    }

    pub fn ended(&self) -> bool {
        lock(&self.inner).ended
    }
}

fn lock(inner: &Arc<Mutex<RecordedResponse>>) -> std::sync::MutexGuard<'_, RecordedResponse> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
