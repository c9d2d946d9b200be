//! # Bookshelf backend library
//!
//! REST backend for a community book catalog: accounts with JWT auth, a
//! paginated and searchable catalog, one review per user and book, personal
//! reading lists, and admin moderation. State lives in Postgres.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server, routing and middleware composition
//! - **SQLx**: asynchronous Postgres access
//! - **Tokio**: async runtime; bcrypt runs on its blocking pool
//! - **Serde** / **validator**: JSON bodies and field rules
//!
//! ## Core Components
//!
//! - [`app`]: router assembly and the global middleware stack
//! - [`auth`]: password hashing and token issuance/verification
//! - [`config`]: layered configuration and validation
//! - [`db`]: idempotent schema setup and legacy migrations
//! - [`error`]: the error type every failure is reported through
//! - [`metrics`]: process counters
//! - [`middleware`]: authentication, roles, rate limiting, CORS, headers
//! - [`models`]: row types and SQL, one module per table family
//! - [`routes`]: HTTP handlers
//! - [`state`]: shared application state
//! - [`types`]: request and response bodies

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
