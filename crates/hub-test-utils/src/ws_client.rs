//! Minimal WebSocket client for end-to-end tests.

use crate::fixtures::{FRAME_WAIT, QUIET_WAIT};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// What the server did next.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Json(serde_json::Value),
    Closed { code: u16, reason: String },
}

pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {}", e))?;
        Ok(Self { stream })
    }

    pub async fn send_json(&mut self, value: serde_json::Value) -> Result<(), anyhow::Error> {
        self.stream
            .send(Message::Text(value.to_string().into()))
            .await
            .map_err(|e| anyhow::anyhow!("send failed: {}", e))
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<(), anyhow::Error> {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| anyhow::anyhow!("send failed: {}", e))
    }

    /// Next text or close event, skipping pings. `None` on timeout.
    pub async fn next_event(&mut self, wait: std::time::Duration) -> Option<ClientEvent> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let next = tokio::time::timeout_at(deadline, self.stream.next())
                .await
                .ok()?;
            match next {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text).ok().map(ClientEvent::Json);
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                        .unwrap_or((u16::from(CloseCode::Status), String::new()));
                    return Some(ClientEvent::Closed { code, reason });
                }
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => {
                    return Some(ClientEvent::Closed {
                        code: u16::from(CloseCode::Abnormal),
                        reason: String::new(),
                    })
                }
            }
        }
    }

    /// Next JSON frame; panics on timeout or close.
    pub async fn next_json(&mut self) -> serde_json::Value {
        match self.next_event(FRAME_WAIT).await {
            Some(ClientEvent::Json(value)) => value,
            other => panic!("expected a JSON frame, got {other:?}"),
        }
    }

    /// Next JSON frame whose `type` is `kind`, skipping others.
    pub async fn next_of_type(&mut self, kind: &str) -> serde_json::Value {
        loop {
            let value = self.next_json().await;
            if value["type"] == kind {
                return value;
            }
        }
    }

    /// Assert that nothing arrives for a short while.
    pub async fn assert_quiet(&mut self) {
        if let Some(event) = self.next_event(QUIET_WAIT).await {
            panic!("expected no frame, got {event:?}");
        }
    }

    /// Discard everything received until the connection goes quiet.
    pub async fn drain(&mut self) {
        while let Some(ClientEvent::Json(_)) = self.next_event(QUIET_WAIT).await {}
    }

    /// Read until the server closes the connection and return the close code.
    pub async fn expect_close(&mut self) -> u16 {
        self.expect_close_frame().await.0
    }

    /// Close code and reason, skipping any frames still queued before it.
    pub async fn expect_close_frame(&mut self) -> (u16, String) {
        loop {
            match self.next_event(FRAME_WAIT).await {
                Some(ClientEvent::Closed { code, reason }) => return (code, reason),
                Some(ClientEvent::Json(_)) => continue,
                None => panic!("connection was not closed"),
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
