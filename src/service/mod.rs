//! HTTP hosting for registered endpoints.

pub mod http;

pub use http::EndpointHttpApp;
