//! HTTP route handlers.
//!
//! - `auth`: signup and login
//! - `books`: catalog listing, search, details, admin add/delete
//! - `reviews`: per-book reviews and the rating ranking
//! - `reading_lists`: the caller's reading lists and their books
//! - `users`: the caller's profile
//! - `admin`: review moderation
//! - `health`: liveness, readiness, version and metrics

pub mod admin;
pub mod auth;
pub mod books;
pub mod health;
pub mod reading_lists;
pub mod reviews;
pub mod users;
