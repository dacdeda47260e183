//! # Hub Test Utilities
//!
//! Shared test utilities for the chat hub.
//!
//! This crate provides:
//! - Token minting for the hub's HS256 identity tokens (`TestTokenBuilder`)
//! - An in-process hub with in-memory collaborators (`TestHub`)
//! - A real server bound to a random port (`TestHubServer`)
//! - A WebSocket client for end-to-end tests (`WsClient`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hub_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestHubServer::spawn().await?;
//!     let mut alice = WsClient::connect(&server.ws_url(&server.token("alice"))).await?;
//!     let frame = alice.next_json().await?;
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;
pub mod tokens;
pub mod ws_client;

pub use fixtures::*;
pub use server_harness::*;
pub use tokens::*;
pub use ws_client::*;
