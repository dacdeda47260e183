//! axum WebSocket endpoint.
//!
//! `GET /ws?token=...` upgrades the request, then hands the socket to the
//! hub: the write half becomes the connection actor's [`WsSink`], and this
//! module drives the read half, feeding every text frame to
//! [`Hub::dispatch`] until the client leaves or the hub closes the
//! connection.

use super::{FrameSink, TransportError};
use crate::hub::Hub;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::borrow::Cow;
use std::time::Duration;
use tracing::{debug, instrument};

/// How long a hub-initiated close waits for the peer's close reply.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Write half of an upgraded socket.
pub struct WsSink {
    sink: SplitSink<WebSocket, Message>,
}

impl WsSink {
    #[must_use]
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, frame: &str) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code,
            reason: Cow::Owned(reason.to_string()),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;
        // Flush and release the write half; the peer's close reply ends the read loop.
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// Router serving the hub endpoint at `/ws`.
pub fn ws_router(hub: Hub) -> Router {
    Router::new().route("/ws", get(upgrade)).with_state(hub)
}

async fn upgrade(
    State(hub): State<Hub>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // Leave room over the frame limit so oversized frames reach the hub and
    // are dropped there instead of killing the socket.
    let max_message_size = hub.limits().max_frame_bytes.saturating_mul(4);
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| serve(hub, socket, params.token))
}

#[instrument(skip_all, name = "hub.transport.ws")]
async fn serve(hub: Hub, socket: WebSocket, token: Option<String>) {
    let (sink, stream) = socket.split();

    let Ok(session) = hub
        .connect(token.as_deref(), Box::new(WsSink::new(sink)))
        .await
    else {
        // Rejection already closed the socket.
        return;
    };

    read_loop(&hub, &session, stream).await;
    hub.disconnect(session.connection_id).await;
}

async fn read_loop(
    hub: &Hub,
    session: &crate::registry::Session,
    mut stream: SplitStream<WebSocket>,
) {
    loop {
        tokio::select! {
            () = session.handle.closed() => {
                debug!(
                    target: "hub.connection",
                    connection_id = %session.connection_id,
                    "Connection closed by hub"
                );
                finish_close(session, &mut stream).await;
                return;
            }
            next = stream.next() => match next {
                Some(Ok(Message::Text(text))) => {
                    // Drops are counted and logged by dispatch.
                    let _ = hub.dispatch(session, &text).await;
                }
                Some(Ok(Message::Binary(bytes))) => {
                    debug!(
                        target: "hub.connection",
                        connection_id = %session.connection_id,
                        len = bytes.len(),
                        "Binary frame ignored"
                    );
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return,
                Some(Err(e)) => {
                    hub.transport_error(session.connection_id, &e.to_string()).await;
                    return;
                }
            }
        }
    }
}

/// Read until the peer answers the hub's close frame so the handshake
/// completes and the peer sees the hub's close code.
async fn finish_close(session: &crate::registry::Session, stream: &mut SplitStream<WebSocket>) {
    let drain = async {
        while let Some(Ok(message)) = stream.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    };
    if tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, drain)
        .await
        .is_err()
    {
        debug!(
            target: "hub.connection",
            connection_id = %session.connection_id,
            "Peer did not answer close"
        );
    }
}
