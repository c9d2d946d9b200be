//! SQL access layer.
//!
//! Each sub-module owns the queries for one table family and returns plain
//! `FromRow` structs. Handlers in [`crate::routes`] never write SQL themselves.
//!
//! - `books`: listing, search and per-book rating aggregates
//! - `reading_lists`: user reading lists and their book memberships
//! - `reviews`: review upserts, per-book listings and moderation
//! - `users`: accounts and profiles

pub mod books;
pub mod reading_lists;
pub mod reviews;
pub mod users;
