//! Typed endpoints and the registry that names their routes.

pub mod registry;

pub use registry::{EndpointRegistry, RouteSelector, RouteSpec};

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::core::SendResult;
use crate::response::Responder;
use crate::validation::{collect_failures, ValidationFailure};

/// The pieces of a matched request an endpoint works with.
#[derive(Debug)]
pub struct RequestParts {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub params: BTreeMap<String, String>,
    pub body: Bytes,
}

impl RequestParts {
    /// Returns a path parameter captured by the route template.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns a header value, ignoring values that are not valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Deserializes the request body as JSON.
    pub fn json_body<T: DeserializeOwned>(&self) -> SendResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes and validates the request body.
    ///
    /// Malformed JSON is reported as a single failure on the `body` field so
    /// callers can hand the result straight to `send_errors`.
    pub fn validated_json<T>(&self) -> Result<T, Vec<ValidationFailure>>
    where
        T: DeserializeOwned + Validate,
    {
        let value: T = serde_json::from_slice(&self.body)
            .map_err(|err| vec![ValidationFailure::new("body", format!("invalid JSON: {err}"))])?;
        value.validate().map_err(|errors| collect_failures(&errors))?;
        Ok(value)
    }
}

/// A handler bound to one or more routes.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Stable name other endpoints can target with `send_created_at`.
    fn name(&self) -> &str;

    /// Routes this endpoint serves.
    fn routes(&self) -> Vec<RouteSpec>;

    async fn call(&self, parts: &RequestParts, rsp: &mut Responder<'_>) -> SendResult<()>;
}

/// An endpoint whose request body is deserialized and validated up front.
///
/// Wrap implementations in [`Validated`] to register them as an [`Endpoint`].
#[async_trait]
pub trait TypedEndpoint: Send + Sync {
    type Request: DeserializeOwned + Validate + Send;

    fn name(&self) -> &str;

    fn routes(&self) -> Vec<RouteSpec>;

    async fn handle(
        &self,
        request: Self::Request,
        parts: &RequestParts,
        rsp: &mut Responder<'_>,
    ) -> SendResult<()>;
}

/// Rejects invalid bodies with a 400 before the inner handler runs.
pub struct Validated<E>(pub E);

#[async_trait]
impl<E: TypedEndpoint> Endpoint for Validated<E> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn routes(&self) -> Vec<RouteSpec> {
        self.0.routes()
    }

    async fn call(&self, parts: &RequestParts, rsp: &mut Responder<'_>) -> SendResult<()> {
        match parts.validated_json::<E::Request>() {
            Ok(request) => self.0.handle(request, parts, rsp).await,
            Err(failures) => rsp.send_errors(&failures).await,
        }
    }
}
