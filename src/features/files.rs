//! File-backed endpoints: static assets and a generated CSV report.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use http::Method;

use crate::core::{SendError, SendResult};
use crate::endpoint::{Endpoint, RequestParts, RouteSpec};
use crate::response::{content_type, BodyStream, Responder, SendOptions};

use super::users::UserStore;

/// Serves files below the configured asset root, with range support.
pub struct AssetEndpoint {
    root: PathBuf,
}

impl AssetEndpoint {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Rejects path segments that could escape the asset root.
    fn resolve(&self, raw: &str) -> Option<PathBuf> {
        if raw.is_empty() || raw.contains('\\') {
            return None;
        }
        let mut path = self.root.clone();
        for segment in raw.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }
}

#[async_trait]
impl Endpoint for AssetEndpoint {
    fn name(&self) -> &str {
        "assets.get"
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(Method::GET, "/assets/{*path}")]
    }

    async fn call(&self, parts: &RequestParts, rsp: &mut Responder<'_>) -> SendResult<()> {
        let path = match parts.param("path").and_then(|raw| self.resolve(raw)) {
            Some(path) => path,
            None => return rsp.send_not_found().await,
        };

        let mut opts = SendOptions::new(content_type_for(&path));
        opts.enable_ranges = true;
        if let Ok(metadata) = tokio::fs::metadata(&path).await {
            opts.last_modified = metadata.modified().ok();
        }

        match rsp.send_file(&path, &opts).await {
            Err(SendError::NotFound(_)) => rsp.send_not_found().await,
            other => other,
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => content_type::APPLICATION_JSON,
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("txt") => content_type::TEXT_PLAIN,
        Some("csv") => "text/csv",
        _ => content_type::APPLICATION_OCTET_STREAM,
    }
}

/// Streams a CSV snapshot of the user store as a download.
pub struct ReportEndpoint {
    store: UserStore,
}

impl ReportEndpoint {
    pub fn new(store: UserStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Endpoint for ReportEndpoint {
    fn name(&self) -> &str {
        "reports.users"
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(Method::GET, "/reports/users.csv")]
    }

    async fn call(&self, _parts: &RequestParts, rsp: &mut Responder<'_>) -> SendResult<()> {
        let mut csv = String::from("id,username,email,created_at\n");
        {
            let store = self.store.read().await;
            let mut users: Vec<_> = store.values().cloned().collect();
            users.sort_by(|a, b| a.username.cmp(&b.username));
            for user in users {
                csv.push_str(&format!(
                    "{},{},{},{}\n",
                    user.id,
                    user.username,
                    user.email,
                    user.created_at.to_rfc3339()
                ));
            }
        }

        let mut opts = SendOptions::new("text/csv");
        opts.file_name = Some("users.csv".to_string());
        let total = csv.len() as u64;
        let stream = BodyStream::plain(Cursor::new(csv.into_bytes()));
        rsp.send_stream(stream, Some(total), &opts).await
    }
}
