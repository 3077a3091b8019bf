//! HTTP handlers. Each one extracts the caller, delegates to a service and
//! maps the result onto a status code.

pub mod auth;
pub mod group;
pub mod metrics;
pub mod permission;
pub mod records;
pub mod user;
