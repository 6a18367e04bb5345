//! Framed transport trait

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::frame::{CloseCode, StreamFrame};

/// Server side of a framed bidirectional connection to one client.
///
/// Owned by the worker that dequeued the session's work item; the worker is
/// responsible for closing it on every exit path. A failed `send` means the
/// peer is gone and surfaces as `GatewayError::ClientDisconnected`.
#[async_trait]
pub trait FrameTransport: Send + 'static {
    /// Send one frame, awaiting until it has drained into the transport.
    /// This is the pipeline's back-pressure point.
    async fn send(&mut self, frame: StreamFrame) -> Result<(), GatewayError>;

    /// Close the connection with the given code. Best-effort.
    async fn close(&mut self, code: CloseCode) -> Result<(), GatewayError>;

    /// Cheap liveness probe, checked at the pipeline's cancellation
    /// checkpoints and before synthesis starts on a queued session.
    fn is_alive(&self) -> bool;
}
