//! User management endpoints.
//!
//! A small CRUD surface over an in-memory store. Creation goes through
//! derive-based validation plus the configured length bounds, and answers
//! with 201 pointing at the canonical `users.get` route.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::{Method, StatusCode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

use crate::config::ApiLimits;
use crate::core::SendResult;
use crate::endpoint::{Endpoint, RequestParts, RouteSelector, RouteSpec, TypedEndpoint};
use crate::response::Responder;
use crate::validation::ValidationFailure;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap());

/// Shared in-memory user store.
pub type UserStore = Arc<RwLock<HashMap<Uuid, User>>>;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(regex(
        path = *USERNAME_RE,
        message = "may only contain letters, digits, '_', '.' and '-'"
    ))]
    pub username: String,
    #[validate(email(message = "not a valid email address"))]
    pub email: String,
    pub display_name: Option<String>,
}

/// Applies the configured length bounds on top of the derive rules.
pub struct CreateUserValidator {
    limits: Arc<ApiLimits>,
}

impl CreateUserValidator {
    pub fn new(limits: Arc<ApiLimits>) -> Self {
        Self { limits }
    }

    pub fn check(&self, request: &CreateUser) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        let username_len = request.username.chars().count() as u64;
        if username_len < self.limits.username_min || username_len > self.limits.username_max {
            failures.push(ValidationFailure::new(
                "username",
                format!(
                    "must be between {} and {} characters",
                    self.limits.username_min, self.limits.username_max
                ),
            ));
        }
        if let Some(name) = &request.display_name {
            if name.chars().count() as u64 > self.limits.display_name_max {
                failures.push(ValidationFailure::new(
                    "display_name",
                    format!("must be at most {} characters", self.limits.display_name_max),
                ));
            }
        }
        failures
    }
}

/// `POST /users`
pub struct CreateUserEndpoint {
    store: UserStore,
    validator: CreateUserValidator,
}

impl CreateUserEndpoint {
    pub fn new(store: UserStore, limits: Arc<ApiLimits>) -> Self {
        Self {
            store,
            validator: CreateUserValidator::new(limits),
        }
    }
}

#[async_trait]
impl TypedEndpoint for CreateUserEndpoint {
    type Request = CreateUser;

    fn name(&self) -> &str {
        "users.create"
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(Method::POST, "/users")]
    }

    async fn handle(
        &self,
        request: CreateUser,
        _parts: &RequestParts,
        rsp: &mut Responder<'_>,
    ) -> SendResult<()> {
        let failures = self.validator.check(&request);
        if !failures.is_empty() {
            return rsp.send_errors(&failures).await;
        }

        let mut store = self.store.write().await;
        if store.values().any(|user| user.username == request.username) {
            let failures = vec![ValidationFailure::new("username", "is already taken")];
            return rsp.send_errors(&failures).await;
        }

        let user = User {
            id: Uuid::new_v4(),
            username: request.username,
            email: request.email,
            display_name: request.display_name,
            created_at: Utc::now(),
        };
        store.insert(user.id, user.clone());
        drop(store);

        let mut values = BTreeMap::new();
        values.insert("id".to_string(), user.id.to_string());
        rsp.send_created_at("users.get", RouteSelector::Any, &values, Some(&user))
            .await
    }
}

/// `GET /users/{id}`
pub struct GetUserEndpoint {
    store: UserStore,
}

impl GetUserEndpoint {
    pub fn new(store: UserStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Endpoint for GetUserEndpoint {
    fn name(&self) -> &str {
        "users.get"
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(Method::GET, "/users/{id}")]
    }

    async fn call(&self, parts: &RequestParts, rsp: &mut Responder<'_>) -> SendResult<()> {
        let id = match parts.param("id").and_then(|raw| Uuid::parse_str(raw).ok()) {
            Some(id) => id,
            None => {
                let failures = vec![ValidationFailure::new("id", "is not a valid UUID")];
                return rsp.send_errors(&failures).await;
            }
        };

        let store = self.store.read().await;
        match store.get(&id) {
            Some(user) => rsp.send_json(user, StatusCode::OK).await,
            None => rsp.send_not_found().await,
        }
    }
}

/// `DELETE /users/{id}`
pub struct DeleteUserEndpoint {
    store: UserStore,
}

impl DeleteUserEndpoint {
    pub fn new(store: UserStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Endpoint for DeleteUserEndpoint {
    fn name(&self) -> &str {
        "users.delete"
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(Method::DELETE, "/users/{id}")]
    }

    async fn call(&self, parts: &RequestParts, rsp: &mut Responder<'_>) -> SendResult<()> {
        let id = match parts.param("id").and_then(|raw| Uuid::parse_str(raw).ok()) {
            Some(id) => id,
            None => return rsp.send_not_found().await,
        };

        let removed = self.store.write().await.remove(&id);
        match removed {
            Some(_) => rsp.send_no_content().await,
            None => rsp.send_not_found().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointRegistry, Validated};
    use crate::testing::CaptureSink;
    use bytes::Bytes;
    use http::HeaderMap;

    fn registry() -> EndpointRegistry {
        let mut registry = EndpointRegistry::new();
        registry
            .register("users.get", &[RouteSpec::new(Method::GET, "/users/{id}")])
            .unwrap();
        registry
    }

    fn store() -> UserStore {
        Arc::new(RwLock::new(HashMap::new()))
    }

    fn parts_with_body(body: &str) -> RequestParts {
        RequestParts {
            method: Method::POST,
            path: "/users".to_string(),
            headers: HeaderMap::new(),
            params: BTreeMap::new(),
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    fn parts_with_id(id: &str) -> RequestParts {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), id.to_string());
        RequestParts {
            method: Method::GET,
            path: format!("/users/{id}"),
            headers: HeaderMap::new(),
            params,
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_create_user_reports_location() {
        let registry = registry();
        let store = store();
        let endpoint = Validated(CreateUserEndpoint::new(
            store.clone(),
            Arc::new(ApiLimits::default()),
        ));

        let mut sink = CaptureSink::new();
        let handle = sink.handle();
        let mut rsp = Responder::new(&mut sink, &registry);
        let parts = parts_with_body(r#"{"username":"alice","email":"alice@example.com"}"#);
        endpoint.call(&parts, &mut rsp).await.unwrap();

        assert_eq!(handle.status(), Some(StatusCode::CREATED));
        let body: serde_json::Value = serde_json::from_slice(&handle.body()).unwrap();
        let id = body["id"].as_str().unwrap();
        assert_eq!(handle.header("location"), Some(format!("/users/{id}")));
        assert_eq!(store.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_user_rejects_bad_username() {
        let registry = registry();
        let endpoint = Validated(CreateUserEndpoint::new(
            store(),
            Arc::new(ApiLimits::default()),
        ));

        let mut sink = CaptureSink::new();
        let handle = sink.handle();
        let mut rsp = Responder::new(&mut sink, &registry);
        let parts = parts_with_body(r#"{"username":"has spaces","email":"a@example.com"}"#);
        endpoint.call(&parts, &mut rsp).await.unwrap();

        assert_eq!(handle.status(), Some(StatusCode::BAD_REQUEST));
        let body: serde_json::Value = serde_json::from_slice(&handle.body()).unwrap();
        assert_eq!(body["errors"][0]["field"], "username");
    }

    #[tokio::test]
    async fn test_create_user_applies_configured_bounds() {
        let registry = registry();
        let limits = ApiLimits {
            username_min: 5,
            ..ApiLimits::default()
        };
        let endpoint = Validated(CreateUserEndpoint::new(store(), Arc::new(limits)));

        let mut sink = CaptureSink::new();
        let handle = sink.handle();
        let mut rsp = Responder::new(&mut sink, &registry);
        let parts = parts_with_body(r#"{"username":"bob","email":"bob@example.com"}"#);
        endpoint.call(&parts, &mut rsp).await.unwrap();

        assert_eq!(handle.status(), Some(StatusCode::BAD_REQUEST));
        let body: serde_json::Value = serde_json::from_slice(&handle.body()).unwrap();
        assert_eq!(body["errors"][0]["field"], "username");
        assert_eq!(
            body["errors"][0]["message"],
            "must be between 5 and 32 characters"
        );
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_username() {
        let registry = registry();
        let store = store();
        let endpoint = Validated(CreateUserEndpoint::new(
            store.clone(),
            Arc::new(ApiLimits::default()),
        ));
        let parts = parts_with_body(r#"{"username":"alice","email":"alice@example.com"}"#);

        let mut sink = CaptureSink::new();
        let mut rsp = Responder::new(&mut sink, &registry);
        endpoint.call(&parts, &mut rsp).await.unwrap();

        let mut sink = CaptureSink::new();
        let handle = sink.handle();
        let mut rsp = Responder::new(&mut sink, &registry);
        endpoint.call(&parts, &mut rsp).await.unwrap();

        assert_eq!(handle.status(), Some(StatusCode::BAD_REQUEST));
        let body: serde_json::Value = serde_json::from_slice(&handle.body()).unwrap();
        assert_eq!(body["errors"][0]["message"], "is already taken");
        assert_eq!(store.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_get_user_round_trip() {
        let registry = registry();
        let store = store();
        let user = User {
            id: Uuid::new_v4(),
            username: "carol".to_string(),
            email: "carol@example.com".to_string(),
            display_name: Some("Carol".to_string()),
            created_at: Utc::now(),
        };
        store.write().await.insert(user.id, user.clone());
        let endpoint = GetUserEndpoint::new(store);

        let mut sink = CaptureSink::new();
        let handle = sink.handle();
        let mut rsp = Responder::new(&mut sink, &registry);
        endpoint
            .call(&parts_with_id(&user.id.to_string()), &mut rsp)
            .await
            .unwrap();

        assert_eq!(handle.status(), Some(StatusCode::OK));
        let body: serde_json::Value = serde_json::from_slice(&handle.body()).unwrap();
        assert_eq!(body["username"], "carol");
        assert_eq!(body["display_name"], "Carol");
    }

    #[tokio::test]
    async fn test_get_user_missing_and_invalid_id() {
        let registry = registry();
        let endpoint = GetUserEndpoint::new(store());

        let mut sink = CaptureSink::new();
        let handle = sink.handle();
        let mut rsp = Responder::new(&mut sink, &registry);
        endpoint
            .call(&parts_with_id(&Uuid::new_v4().to_string()), &mut rsp)
            .await
            .unwrap();
        assert_eq!(handle.status(), Some(StatusCode::NOT_FOUND));

        let mut sink = CaptureSink::new();
        let handle = sink.handle();
        let mut rsp = Responder::new(&mut sink, &registry);
        endpoint.call(&parts_with_id("not-a-uuid"), &mut rsp).await.unwrap();
        assert_eq!(handle.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let registry = registry();
        let store = store();
        let user = User {
            id: Uuid::new_v4(),
            username: "dave".to_string(),
            email: "dave@example.com".to_string(),
            display_name: None,
            created_at: Utc::now(),
        };
        store.write().await.insert(user.id, user.clone());
        let endpoint = DeleteUserEndpoint::new(store.clone());

        let mut sink = CaptureSink::new();
        let handle = sink.handle();
        let mut rsp = Responder::new(&mut sink, &registry);
        endpoint
            .call(&parts_with_id(&user.id.to_string()), &mut rsp)
            .await
            .unwrap();
        assert_eq!(handle.status(), Some(StatusCode::NO_CONTENT));
        assert!(store.read().await.is_empty());

        let mut sink = CaptureSink::new();
        let handle = sink.handle();
        let mut rsp = Responder::new(&mut sink, &registry);
        endpoint
            .call(&parts_with_id(&user.id.to_string()), &mut rsp)
            .await
            .unwrap();
        assert_eq!(handle.status(), Some(StatusCode::NOT_FOUND));
    }
}
