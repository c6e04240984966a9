//! The response dispatcher.
//!
//! A `Responder` borrows the transport sink for one request and writes at
//! most one response through it. Every send operation checks the write flag
//! first, prepares the full payload (serialization, route resolution, file
//! open, range evaluation) before touching the transport, and honors the
//! cancellation signal between transport writes. Failures before the first
//! write leave the sink untouched so the caller can still send a fallback.

use std::collections::BTreeMap;
use std::future::Future;
use std::io::SeekFrom;
use std::path::Path;
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{header, StatusCode};
use pingora_http::ResponseHeader;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use crate::core::{CancelWatch, ResponseSink, SendError, SendResult};
use crate::endpoint::registry::{EndpointRegistry, RouteSelector};
use crate::validation::ValidationFailure;

use super::body::{BodyStream, SeekableStream, SendOptions};
use super::content_type;
use super::range::{self, RangeOutcome};

/// Chunk size for streamed bodies.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Serialize)]
struct ErrorBody<'a> {
    errors: &'a [ValidationFailure],
}

/// Writes one response for one request.
pub struct Responder<'a> {
    sink: &'a mut dyn ResponseSink,
    registry: &'a EndpointRegistry,
    cancel: Option<CancelWatch>,
    range_header: Option<String>,
    written: bool,
}

impl<'a> Responder<'a> {
    pub fn new(sink: &'a mut dyn ResponseSink, registry: &'a EndpointRegistry) -> Self {
        Self {
            sink,
            registry,
            cancel: None,
            range_header: None,
            written: false,
        }
    }

    /// Attaches a cancellation signal, checked around every transport write.
    pub fn with_cancel(mut self, cancel: CancelWatch) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Attaches the request's `Range` header, if any.
    pub fn with_range_header(mut self, value: Option<String>) -> Self {
        self.range_header = value;
        self
    }

    /// Whether this responder has started writing a response.
    pub fn written(&self) -> bool {
        self.written
    }

    /// Serializes `body` as JSON and sends it with the given status.
    pub async fn send_json<T>(&mut self, body: &T, status: StatusCode) -> SendResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_unwritten()?;
        let payload = serde_json::to_vec(body)?;
        self.send_full(
            status,
            payload.into(),
            Some(content_type::APPLICATION_JSON),
            Vec::new(),
        )
        .await
    }

    /// Sends 201 with a `Location` header resolved from the endpoint
    /// registry, plus an optional JSON body.
    ///
    /// Resolution failures surface before anything is written, so the caller
    /// can still dispatch a different response.
    pub async fn send_created_at<T>(
        &mut self,
        target: &str,
        selector: RouteSelector,
        values: &BTreeMap<String, String>,
        body: Option<&T>,
    ) -> SendResult<()>
    where
        T: Serialize,
    {
        self.ensure_unwritten()?;
        let location = self.registry.resolve(target, &selector, values)?;
        let extra = vec![(header::LOCATION, location)];
        match body {
            Some(payload) => {
                let payload = serde_json::to_vec(payload)?;
                self.send_full(
                    StatusCode::CREATED,
                    payload.into(),
                    Some(content_type::APPLICATION_JSON),
                    extra,
                )
                .await
            }
            None => {
                self.send_full(StatusCode::CREATED, Bytes::new(), None, extra)
                    .await
            }
        }
    }

    /// Sends plain text with the given status.
    pub async fn send_string(&mut self, content: &str, status: StatusCode) -> SendResult<()> {
        self.ensure_unwritten()?;
        self.send_full(
            status,
            Bytes::copy_from_slice(content.as_bytes()),
            Some(content_type::TEXT_PLAIN),
            Vec::new(),
        )
        .await
    }

    /// Sends a bodyless response with the given status.
    pub async fn send_status(&mut self, status: StatusCode) -> SendResult<()> {
        self.ensure_unwritten()?;
        self.send_full(status, Bytes::new(), None, Vec::new()).await
    }

    pub async fn send_ok(&mut self) -> SendResult<()> {
        self.send_status(StatusCode::OK).await
    }

    pub async fn send_no_content(&mut self) -> SendResult<()> {
        self.send_status(StatusCode::NO_CONTENT).await
    }

    pub async fn send_not_found(&mut self) -> SendResult<()> {
        self.send_status(StatusCode::NOT_FOUND).await
    }

    pub async fn send_unauthorized(&mut self) -> SendResult<()> {
        self.send_status(StatusCode::UNAUTHORIZED).await
    }

    pub async fn send_forbidden(&mut self) -> SendResult<()> {
        self.send_status(StatusCode::FORBIDDEN).await
    }

    /// Sends 400 with the serialized failure list.
    ///
    /// An empty list still produces 400 with `{"errors": []}`: reaching this
    /// call means the request was rejected, and an empty list is taken as a
    /// caller bug rather than a reason to succeed quietly.
    pub async fn send_errors(&mut self, failures: &[ValidationFailure]) -> SendResult<()> {
        self.send_json(&ErrorBody { errors: failures }, StatusCode::BAD_REQUEST)
            .await
    }

    /// Sends 200 with a literal `{}` body.
    pub async fn send_empty_json_object(&mut self) -> SendResult<()> {
        self.ensure_unwritten()?;
        self.send_full(
            StatusCode::OK,
            Bytes::from_static(b"{}"),
            Some(content_type::APPLICATION_JSON),
            Vec::new(),
        )
        .await
    }

    /// Sends an in-memory payload, honoring the request's `Range` header
    /// when `opts.enable_ranges` is set.
    pub async fn send_bytes(&mut self, data: Bytes, opts: &SendOptions) -> SendResult<()> {
        self.ensure_unwritten()?;
        let total = data.len() as u64;
        match self.range_outcome(opts, Some(total)) {
            RangeOutcome::Full => {
                let extra = representation_headers(opts, opts.enable_ranges);
                self.send_full(
                    StatusCode::OK,
                    data,
                    Some(opts.content_type.as_str()),
                    extra,
                )
                .await
            }
            RangeOutcome::Partial(r) => {
                let slice = data.slice(r.start as usize..=r.end as usize);
                let mut extra = representation_headers(opts, false);
                extra.push((
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", r.start, r.end, total),
                ));
                self.send_full(
                    StatusCode::PARTIAL_CONTENT,
                    slice,
                    Some(opts.content_type.as_str()),
                    extra,
                )
                .await
            }
            RangeOutcome::Unsatisfiable => self.send_unsatisfiable(total).await,
        }
    }

    /// Opens and streams a file from disk.
    ///
    /// A file missing at dispatch time surfaces as `SendError::NotFound`
    /// with nothing written.
    pub async fn send_file(
        &mut self,
        path: impl AsRef<Path>,
        opts: &SendOptions,
    ) -> SendResult<()> {
        self.ensure_unwritten()?;
        let path = path.as_ref();
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SendError::NotFound(path.display().to_string()));
            }
            Err(err) => return Err(SendError::Io(err)),
        };
        let total = file.metadata().await?.len();
        self.stream_seekable(Box::new(file), total, opts).await
    }

    /// Streams an arbitrary reader.
    ///
    /// Only seekable streams with a known total length can honor ranges;
    /// everything else is sent in full and the `Range` header is ignored.
    pub async fn send_stream(
        &mut self,
        stream: BodyStream,
        total_len: Option<u64>,
        opts: &SendOptions,
    ) -> SendResult<()> {
        self.ensure_unwritten()?;
        match (stream, total_len) {
            (BodyStream::Seekable(reader), Some(total)) => {
                self.stream_seekable(reader, total, opts).await
            }
            (BodyStream::Seekable(mut reader), None) => {
                self.stream_full(&mut reader, None, opts).await
            }
            (BodyStream::Plain(mut reader), total) => {
                self.stream_full(&mut reader, total, opts).await
            }
        }
    }

    async fn stream_seekable(
        &mut self,
        mut reader: Box<dyn SeekableStream>,
        total: u64,
        opts: &SendOptions,
    ) -> SendResult<()> {
        match self.range_outcome(opts, Some(total)) {
            RangeOutcome::Full => {
                let extra = representation_headers(opts, opts.enable_ranges);
                let resp = build_header(
                    StatusCode::OK,
                    Some(total as usize),
                    Some(opts.content_type.as_str()),
                    extra,
                )?;
                self.written = true;
                self.write_header(resp, false).await?;
                self.stream_body(&mut reader, Some(total)).await
            }
            RangeOutcome::Partial(r) => {
                reader.seek(SeekFrom::Start(r.start)).await?;
                let mut extra = representation_headers(opts, false);
                extra.push((
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", r.start, r.end, total),
                ));
                let resp = build_header(
                    StatusCode::PARTIAL_CONTENT,
                    Some(r.len() as usize),
                    Some(opts.content_type.as_str()),
                    extra,
                )?;
                self.written = true;
                self.write_header(resp, false).await?;
                self.stream_body(&mut reader, Some(r.len())).await
            }
            RangeOutcome::Unsatisfiable => self.send_unsatisfiable(total).await,
        }
    }

    async fn stream_full<R>(
        &mut self,
        reader: &mut R,
        total: Option<u64>,
        opts: &SendOptions,
    ) -> SendResult<()>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
    {
        let extra = representation_headers(opts, false);
        let resp = build_header(
            StatusCode::OK,
            total.map(|n| n as usize),
            Some(opts.content_type.as_str()),
            extra,
        )?;
        self.written = true;
        self.write_header(resp, false).await?;
        self.stream_body(reader, total).await
    }

    async fn stream_body<R>(&mut self, reader: &mut R, limit: Option<u64>) -> SendResult<()>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
    {
        let mut remaining = limit;
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        loop {
            let want = match remaining {
                Some(n) => n.min(STREAM_CHUNK_SIZE as u64) as usize,
                None => STREAM_CHUNK_SIZE,
            };
            if want == 0 {
                return self.write_body(Bytes::new(), true).await;
            }
            let read = cancellable(&mut self.cancel, reader.read(&mut buf[..want])).await?;
            let n = match read {
                Ok(n) => n,
                Err(err) => return Err(SendError::Io(err)),
            };
            if n == 0 {
                return match remaining {
                    // the header already promised more bytes; a clean end
                    // here would mark a truncated body as complete
                    Some(missing) => Err(SendError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("body ended {missing} bytes short of the declared length"),
                    ))),
                    None => self.write_body(Bytes::new(), true).await,
                };
            }
            if let Some(left) = remaining.as_mut() {
                *left -= n as u64;
            }
            let end = remaining == Some(0);
            self.write_body(Bytes::copy_from_slice(&buf[..n]), end)
                .await?;
            if end {
                return Ok(());
            }
        }
    }

    async fn send_full(
        &mut self,
        status: StatusCode,
        body: Bytes,
        content_type: Option<&str>,
        extra: Vec<(header::HeaderName, String)>,
    ) -> SendResult<()> {
        let content_length = if status == StatusCode::NO_CONTENT {
            None
        } else {
            Some(body.len())
        };
        let resp = build_header(status, content_length, content_type, extra)?;
        self.written = true;
        if body.is_empty() {
            self.write_header(resp, true).await
        } else {
            self.write_header(resp, false).await?;
            self.write_body(body, true).await
        }
    }

    async fn send_unsatisfiable(&mut self, total: u64) -> SendResult<()> {
        let extra = vec![(header::CONTENT_RANGE, format!("bytes */{total}"))];
        self.send_full(StatusCode::RANGE_NOT_SATISFIABLE, Bytes::new(), None, extra)
            .await
    }

    fn range_outcome(&self, opts: &SendOptions, total: Option<u64>) -> RangeOutcome {
        if !opts.enable_ranges {
            return RangeOutcome::Full;
        }
        let Some(total) = total else {
            return RangeOutcome::Full;
        };
        match self.range_header.as_deref() {
            Some(value) => range::evaluate(value, total),
            None => RangeOutcome::Full,
        }
    }

    fn ensure_unwritten(&self) -> SendResult<()> {
        if self.written {
            Err(SendError::AlreadyWritten)
        } else {
            Ok(())
        }
    }

    async fn write_header(&mut self, header: ResponseHeader, end: bool) -> SendResult<()> {
        cancellable(&mut self.cancel, self.sink.send_header(header, end)).await?
    }

    async fn write_body(&mut self, chunk: Bytes, end: bool) -> SendResult<()> {
        cancellable(&mut self.cancel, self.sink.send_body(chunk, end)).await?
    }
}

/// Runs one dispatch step unless the cancel signal fires first.
async fn cancellable<F: Future>(cancel: &mut Option<CancelWatch>, fut: F) -> SendResult<F::Output> {
    let Some(watch) = cancel.as_mut() else {
        return Ok(fut.await);
    };
    if *watch.borrow() {
        return Err(SendError::Cancelled);
    }
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            changed = watch.changed() => match changed {
                Ok(()) => {
                    if *watch.borrow() {
                        return Err(SendError::Cancelled);
                    }
                }
                // sender side gone, cancellation can no longer fire
                Err(_) => return Ok(fut.await),
            },
            output = &mut fut => return Ok(output),
        }
    }
}

fn build_header(
    status: StatusCode,
    content_length: Option<usize>,
    content_type: Option<&str>,
    extra: Vec<(header::HeaderName, String)>,
) -> SendResult<ResponseHeader> {
    let mut resp = ResponseHeader::build(status, None)?;
    if let Some(len) = content_length {
        resp.insert_header(header::CONTENT_LENGTH, len.to_string())?;
    }
    if let Some(ct) = content_type {
        insert_checked(&mut resp, header::CONTENT_TYPE, ct)?;
    }
    for (name, value) in extra {
        insert_checked(&mut resp, name, &value)?;
    }
    Ok(resp)
}

fn insert_checked(
    resp: &mut ResponseHeader,
    name: header::HeaderName,
    value: &str,
) -> SendResult<()> {
    let label = name.clone();
    resp.insert_header(name, value)
        .map_err(|err| SendError::InvalidHeader(format!("{label}: {err}")))?;
    Ok(())
}

fn representation_headers(
    opts: &SendOptions,
    advertise_ranges: bool,
) -> Vec<(header::HeaderName, String)> {
    let mut extra = Vec::new();
    if let Some(name) = &opts.file_name {
        extra.push((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", sanitize_file_name(name)),
        ));
    }
    if let Some(modified) = opts.last_modified {
        extra.push((header::LAST_MODIFIED, imf_fixdate(modified)));
    }
    if advertise_ranges {
        extra.push((header::ACCEPT_RANGES, "bytes".to_string()));
    }
    extra
}

fn sanitize_file_name(name: &str) -> String {
    name.replace(['"', '\\', '\r', '\n'], "_")
}

fn imf_fixdate(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
