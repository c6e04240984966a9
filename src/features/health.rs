//! Liveness and readiness endpoints.

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Serialize;

use crate::core::SendResult;
use crate::endpoint::{Endpoint, RequestParts, RouteSpec};
use crate::response::Responder;

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
}

/// `GET /status/live`, answering with an empty JSON object.
pub struct LivenessEndpoint;

#[async_trait]
impl Endpoint for LivenessEndpoint {
    fn name(&self) -> &str {
        "health.live"
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(Method::GET, "/status/live")]
    }

    async fn call(&self, _parts: &RequestParts, rsp: &mut Responder<'_>) -> SendResult<()> {
        rsp.send_empty_json_object().await
    }
}

/// `GET /status/ready`
pub struct ReadinessEndpoint;

#[async_trait]
impl Endpoint for ReadinessEndpoint {
    fn name(&self) -> &str {
        "health.ready"
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(Method::GET, "/status/ready")]
    }

    async fn call(&self, _parts: &RequestParts, rsp: &mut Responder<'_>) -> SendResult<()> {
        let response = ReadyResponse {
            status: "ok".to_string(),
        };
        rsp.send_json(&response, StatusCode::OK).await
    }
}
