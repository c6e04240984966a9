//! Endpoints served by the demo binary.

pub mod files;
pub mod health;
pub mod users;
