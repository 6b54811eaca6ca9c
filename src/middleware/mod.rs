//! Middleware for observability.
//!
//! Request logging with latency tracking; access enforcement lives in
//! `crate::auth::middleware` next to the policy it applies.

pub mod logging;

pub use logging::request_logging;
