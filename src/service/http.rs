//! Endpoint hosting over the pingora HTTP server.
//!
//! `EndpointHttpApp` owns the route table and the endpoint registry. Each
//! accepted session is matched against the table, the request body is read
//! up to the configured limit, and the matched endpoint runs against a
//! `Responder` wired to the session. The server's shutdown watch doubles as
//! the cancellation signal for in-flight dispatches: a cancelled dispatch
//! drops the connection instead of flushing a truncated body.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{header, Method, StatusCode};
use matchit::{Match, Router};
use pingora::apps::HttpServerApp;
use pingora::protocols::http::ServerSession;
use pingora::protocols::Stream;
use pingora::server::ShutdownWatch;
use pingora::services::listening::Service;
use pingora_http::ResponseHeader;

use crate::config::ServerSettings;
use crate::config_error;
use crate::core::{ResponseSink, SendError, SendResult};
use crate::endpoint::{Endpoint, EndpointRegistry, RequestParts};
use crate::response::Responder;

/// One registered template and its per-method handlers.
///
/// The original template spelling is kept because router lookups match
/// paths rather than compare templates.
struct RouteEntry {
    template: String,
    methods: HashMap<Method, Arc<dyn Endpoint>>,
}

/// HTTP application serving registered endpoints.
pub struct EndpointHttpApp {
    router: Router<RouteEntry>,
    registry: EndpointRegistry,
    max_body_bytes: usize,
    keepalive_secs: Option<u64>,
}

impl EndpointHttpApp {
    pub fn new(settings: &ServerSettings) -> Self {
        let keepalive_secs = match settings.keepalive_secs {
            0 => None,
            secs => Some(secs),
        };
        Self {
            router: Router::new(),
            registry: EndpointRegistry::new(),
            max_body_bytes: settings.max_body_bytes,
            keepalive_secs,
        }
    }

    /// The registry endpoints resolve `send_created_at` targets against.
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Registers an endpoint under its name and routes.
    ///
    /// Registration is explicit and happens before the server starts; a
    /// duplicate name, duplicate route, or invalid template fails here
    /// rather than at request time.
    pub fn register(&mut self, endpoint: Arc<dyn Endpoint>) -> SendResult<()> {
        let routes = endpoint.routes();
        self.registry.register(endpoint.name(), &routes)?;
        for route in routes {
            // `at_mut` matches the template as a plain path, so a lookup can
            // land on a node whose template is spelled differently (a stored
            // `{id}` segment captures the literal text `{item_id}`). Merge
            // methods only into the byte-identical template; everything else
            // goes through `insert`, which rejects real conflicts.
            let merged = match self.router.at_mut(&route.template) {
                Ok(found) => {
                    if found.value.template == route.template {
                        if found
                            .value
                            .methods
                            .insert(route.method.clone(), endpoint.clone())
                            .is_some()
                        {
                            return Err(config_error!(
                                "duplicate route {} {}",
                                route.method,
                                route.template
                            ));
                        }
                        true
                    } else {
                        false
                    }
                }
                Err(_) => false,
            };
            if !merged {
                let mut methods = HashMap::new();
                methods.insert(route.method.clone(), endpoint.clone());
                let entry = RouteEntry {
                    template: route.template.clone(),
                    methods,
                };
                self.router.insert(route.template.as_str(), entry).map_err(|err| {
                    config_error!("failed to insert route {}: {}", route.template, err)
                })?;
            }
        }
        log::info!("Registered endpoint: {}", endpoint.name());
        Ok(())
    }

    /// Wraps the app in a TCP listening service bound to the configured
    /// addresses.
    pub fn into_service(self, settings: &ServerSettings) -> Service<Self> {
        let mut service = Service::new("Endpoint HTTP".to_string(), self);
        for listener in settings.listeners.iter() {
            service.add_tcp(&listener.address.to_string());
        }
        service
    }

    /// Picks the endpoint serving a request line, or the status to answer
    /// with: 404 for an unmatched path, 405 for a matched path without the
    /// method.
    fn route_request(
        &self,
        path: &str,
        method: &Method,
    ) -> Result<(Arc<dyn Endpoint>, BTreeMap<String, String>), StatusCode> {
        match self.router.at(path) {
            Ok(Match { value, params }) => match value.methods.get(method) {
                Some(endpoint) => {
                    let params: BTreeMap<String, String> = params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();
                    Ok((endpoint.clone(), params))
                }
                None => Err(StatusCode::METHOD_NOT_ALLOWED),
            },
            Err(_) => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn handle_request(
        &self,
        session: &mut ServerSession,
        path: String,
        method: Method,
        range_header: Option<String>,
        shutdown: &ShutdownWatch,
    ) -> SendResult<()> {
        // resolve the endpoint before touching the body
        let (endpoint, params) = match self.route_request(&path, &method) {
            Ok(hit) => hit,
            Err(status) => return self.respond_status(session, shutdown, status).await,
        };

        let body = match read_body_limited(session, self.max_body_bytes).await? {
            BodyRead::Full(body) => body,
            BodyRead::TooLarge => {
                session.set_keepalive(None);
                return self
                    .respond_status(session, shutdown, StatusCode::PAYLOAD_TOO_LARGE)
                    .await;
            }
        };

        let parts = RequestParts {
            method,
            path,
            headers: session.req_header().headers.clone(),
            params,
            body,
        };

        let mut sink = SessionSink { session };
        let mut rsp = Responder::new(&mut sink, &self.registry)
            .with_cancel(shutdown.clone())
            .with_range_header(range_header);
        run_endpoint(endpoint.as_ref(), &parts, &mut rsp).await
    }

    async fn respond_status(
        &self,
        session: &mut ServerSession,
        shutdown: &ShutdownWatch,
        status: StatusCode,
    ) -> SendResult<()> {
        let mut sink = SessionSink { session };
        let mut rsp = Responder::new(&mut sink, &self.registry).with_cancel(shutdown.clone());
        rsp.send_status(status).await
    }
}

#[async_trait]
impl HttpServerApp for EndpointHttpApp {
    async fn process_new_http(
        self: &Arc<Self>,
        mut session: ServerSession,
        shutdown: &ShutdownWatch,
    ) -> Option<Stream> {
        match session.read_request().await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err) => {
                log::debug!("Failed to read request header: {err}");
                return None;
            }
        }

        if *shutdown.borrow() {
            session.set_keepalive(None);
        } else {
            session.set_keepalive(self.keepalive_secs);
        }

        let (path, method) = {
            let req_header = session.req_header();
            (req_header.uri.path().to_string(), req_header.method.clone())
        };
        let range_header = session
            .get_header(header::RANGE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let outcome = self
            .handle_request(&mut session, path, method, range_header, shutdown)
            .await;
        match outcome {
            Ok(()) => match session.finish().await {
                Ok(stream) => stream,
                Err(err) => {
                    log::error!("Failed to finish session: {err}");
                    None
                }
            },
            // dropping the session aborts the connection without flushing
            Err(SendError::Cancelled) => {
                log::info!("Request cancelled by shutdown, closing connection");
                None
            }
            Err(err) => {
                log::error!("Request handling failed: {err}");
                None
            }
        }
    }
}

/// Runs an endpoint and normalizes its outcome into one written response.
///
/// A handler that returns without dispatching gets a 204; a handler error
/// before the first write gets a 500; an error after the first write (and
/// any cancellation) propagates so the connection is aborted.
async fn run_endpoint(
    endpoint: &dyn Endpoint,
    parts: &RequestParts,
    rsp: &mut Responder<'_>,
) -> SendResult<()> {
    match endpoint.call(parts, rsp).await {
        Ok(()) => {
            if !rsp.written() {
                log::debug!("Endpoint {} wrote no response, sending 204", endpoint.name());
                rsp.send_no_content().await?;
            }
            Ok(())
        }
        Err(SendError::Cancelled) => Err(SendError::Cancelled),
        Err(err) => {
            log::error!("Endpoint {} failed: {}", endpoint.name(), err);
            if rsp.written() {
                Err(err)
            } else {
                rsp.send_status(StatusCode::INTERNAL_SERVER_ERROR).await
            }
        }
    }
}

struct SessionSink<'a> {
    session: &'a mut ServerSession,
}

#[async_trait]
impl ResponseSink for SessionSink<'_> {
    async fn send_header(&mut self, header: ResponseHeader, _end: bool) -> SendResult<()> {
        self.session.write_response_header(Box::new(header)).await?;
        Ok(())
    }

    async fn send_body(&mut self, chunk: Bytes, end: bool) -> SendResult<()> {
        self.session.write_response_body(chunk, end).await?;
        Ok(())
    }
}

enum BodyRead {
    Full(Bytes),
    TooLarge,
}

/// Source of request body chunks; `None` marks the end of the body.
#[async_trait]
trait RequestBodyRead: Send {
    async fn next_chunk(&mut self) -> SendResult<Option<Bytes>>;
}

#[async_trait]
impl RequestBodyRead for ServerSession {
    async fn next_chunk(&mut self) -> SendResult<Option<Bytes>> {
        Ok(self.read_request_body().await?)
    }
}

async fn read_body_limited<R: RequestBodyRead>(
    source: &mut R,
    limit: usize,
) -> SendResult<BodyRead> {
    let mut body = BytesMut::new();
    while let Some(chunk) = source.next_chunk().await? {
        if body.len() + chunk.len() > limit {
            return Ok(BodyRead::TooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(BodyRead::Full(body.freeze()))
}
