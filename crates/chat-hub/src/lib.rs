//! Chat Hub Library
//!
//! Real-time presence, routing and call-signaling hub for chat clients.
//! Clients hold one WebSocket each; the hub authenticates the connection,
//! tracks who is online, routes room traffic to room members, relays 1:1
//! call signaling and key material, and runs small group conferences.
//!
//! # Architecture
//!
//! ```text
//! transport/ws.rs -> hub/ (connect, dispatch, disconnect) -> actors/ -> sinks
//!                        \-> repositories/ + services/ (collaborators)
//! routes/mod.rs -> middleware/auth.rs -> handlers/conferences.rs -> hub/conference.rs
//! ```
//!
//! # Modules
//!
//! - `actors` - Connection and conference manager actors
//! - `auth` - Identity token validation
//! - `conference` - Pure conference roster state machine
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping, frame drop reasons
//! - `handlers` - HTTP request handlers
//! - `hub` - Session lifecycle, dispatch and fan-out
//! - `middleware` - Bearer authentication for REST routes
//! - `observability` - Metrics and health endpoints
//! - `protocol` - Wire frames and envelopes
//! - `registry` - Live session registry
//! - `repositories` - Room directory, message and presence stores
//! - `routes` - Axum router setup
//! - `services` - Push notification
//! - `tasks` - Scheduled delivery and expiry sweeps
//! - `transport` - Frame sinks and the WebSocket endpoint

pub mod actors;
pub mod auth;
pub mod conference;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod hub;
pub mod middleware;
pub mod observability;
pub mod protocol;
pub mod registry;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tasks;
pub mod transport;

#[cfg(test)]
mod test_support;
