//! HTTP middleware for the chat hub.
//!
//! - `auth` - Bearer token authentication for the conference REST routes

pub mod auth;

pub use auth::require_auth;
