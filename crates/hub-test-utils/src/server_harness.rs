//! Test server harness for E2E testing
//!
//! Provides `TestHubServer` for spawning a real hub server in tests.

use crate::fixtures::TestHub;
use crate::tokens::mint_token;
use chat_hub::observability::HealthState;
use chat_hub::routes::{self, AppState};
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A hub served over HTTP and WebSocket on `127.0.0.1:<random>`.
///
/// Derefs to the underlying [`TestHub`] so tests can seed rooms and inspect
/// stores directly.
///
/// # Example
/// ```rust,ignore
/// let server = TestHubServer::spawn().await?;
/// server.private_room("r1", &["alice", "bob"]).await;
/// let mut alice = WsClient::connect(&server.ws_url(&server.token("alice"))).await?;
/// ```
pub struct TestHubServer {
    addr: SocketAddr,
    test_hub: TestHub,
    health: Arc<HealthState>,
    _handle: JoinHandle<()>,
}

impl TestHubServer {
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let test_hub = TestHub::new().await;
        let health = Arc::new(HealthState::new(Arc::clone(test_hub.hub.metrics())));

        let app = routes::build_routes(AppState {
            hub: test_hub.hub.clone(),
            health: Arc::clone(&health),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });
        health.set_ready();

        Ok(Self {
            addr,
            test_hub,
            health,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL carrying `token` in the query string.
    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    /// Valid token for `username`.
    pub fn token(&self, username: &str) -> String {
        mint_token(username)
    }
}

impl Deref for TestHubServer {
    type Target = TestHub;

    fn deref(&self) -> &TestHub {
        &self.test_hub
    }
}

impl Drop for TestHubServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
