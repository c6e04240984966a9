//! Typed endpoint response dispatch over the pingora HTTP server.
//!
//! Endpoint handlers answer requests through a single-write [`response::Responder`],
//! resolve `Location` targets against an explicit [`endpoint::EndpointRegistry`],
//! and are hosted by [`service::EndpointHttpApp`].

pub mod config;
pub mod core;
pub mod endpoint;
pub mod features;
pub mod response;
pub mod service;
pub mod testing;
pub mod validation;
