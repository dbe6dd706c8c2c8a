//! HTTP middleware: request logging and response hardening.

pub mod logging;
pub mod security;

pub use logging::request_logging;
pub use security::{cors_layer, with_request_id, with_security_headers};
