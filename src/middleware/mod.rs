//! Middleware components for HTTP request processing.
//!
//! Authentication and role checks, per-IP rate limiting, CORS, security
//! headers, and the request-body validation extractor live here. The router
//! in [`crate::app`] decides which routes each layer wraps.

pub mod auth;
pub mod cors;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use auth::AuthUser;
pub use rate_limit::EndpointRateLimiter;
pub use validation::ValidatedJson;
