//! WebSocket streaming endpoint
//!
//! `GET /v1/tts/stream/{session_id}` upgrades to a WebSocket and hands the
//! connection to the worker pool as a framed transport. The server is the
//! only sender; the read half exists solely to observe the client going
//! away, which the pipeline picks up at its cancellation checkpoints.

use std::borrow::Cow;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::Response,
};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tts_gateway_core::{CloseCode, FrameTransport, GatewayError, StreamFrame};
use tts_gateway_pipeline::{EnqueueError, SessionWorkItem};

use crate::state::AppState;

/// Framed transport over one WebSocket connection.
pub struct WsTransport {
    sender: SplitSink<WebSocket, Message>,
    alive: watch::Receiver<bool>,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn send(&mut self, frame: StreamFrame) -> Result<(), GatewayError> {
        let json = serde_json::to_string(&frame)
            .map_err(|e| GatewayError::Internal(format!("frame serialization failed: {}", e)))?;

        self.sender
            .send(Message::Text(json))
            .await
            .map_err(|_| GatewayError::ClientDisconnected)
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), GatewayError> {
        let close = Message::Close(Some(CloseFrame {
            code: code.as_u16(),
            reason: Cow::Borrowed(""),
        }));
        let _ = self.sender.send(close).await;
        let _ = self.sender.flush().await;

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }
}

/// Streaming endpoint handler. Unknown sessions are rejected before the
/// upgrade.
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, StatusCode> {
    if state.store().get(&session_id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session_id, state)))
}

async fn handle_socket(socket: WebSocket, session_id: String, state: AppState) {
    let (sender, mut receiver) = socket.split();

    // The read half only watches for the peer going away.
    let (alive_tx, alive_rx) = watch::channel(true);
    let reader = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
        let _ = alive_tx.send(false);
    });

    let transport = WsTransport {
        sender,
        alive: alive_rx,
        reader: Some(reader),
    };

    let item = SessionWorkItem {
        session_id: session_id.clone(),
        transport: Box::new(transport),
    };

    match state.queue.enqueue(item) {
        Ok(()) => {
            tracing::debug!(session_id = %session_id, "Session enqueued for streaming");
        }
        Err(EnqueueError::Full(mut item)) => {
            let _ = item
                .transport
                .send(StreamFrame::error(503, "queue_full"))
                .await;
            let _ = item.transport.close(CloseCode::TryAgainLater).await;
        }
        Err(EnqueueError::Closed(mut item)) => {
            let _ = item
                .transport
                .send(StreamFrame::error(503, "shutting_down"))
                .await;
            let _ = item.transport.close(CloseCode::TryAgainLater).await;
        }
    }
}
