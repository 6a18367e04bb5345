//! Error taxonomy for the gateway
//!
//! Each variant maps to one row of the error policy table: where it is
//! raised, how it surfaces to the client, and whether anything retries it.

use std::time::Duration;

use thiserror::Error;

use crate::frame::CloseCode;
use crate::session::SessionStatus;

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unknown voice: {0}")]
    UnknownVoice(String),

    #[error("rate limited, retry after {retry_after_s}s")]
    RateLimited { retry_after_s: u64 },

    #[error("streaming queue is full")]
    QueueFull,

    #[error("circuit open for provider {0}")]
    CircuitOpen(String),

    #[error("provider pull timed out after {0:?}")]
    ProviderTimeout(Duration),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider failed mid-stream: {0}")]
    ProviderMidStream(String),

    #[error("transcode failed: {0}")]
    Transcode(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("illegal session transition: {from} -> {to}")]
    IllegalTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("client disconnected")]
    ClientDisconnected,

    #[error("session deadline exceeded")]
    DeadlineExceeded,

    #[error("shutting down")]
    ShuttingDown,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Error frame `(code, message)` for failures that surface on the
    /// streaming transport. `None` for conditions that never produce a
    /// terminal error frame (client cancellation).
    pub fn frame_payload(&self) -> Option<(u16, &str)> {
        match self {
            GatewayError::QueueFull => Some((503, "queue_full")),
            GatewayError::CircuitOpen(_) => Some((503, "provider_unavailable")),
            GatewayError::ShuttingDown => Some((503, "shutting_down")),
            GatewayError::ProviderTimeout(_) | GatewayError::Provider(_) => {
                Some((502, "provider_error"))
            }
            GatewayError::ProviderMidStream(_) => Some((502, "provider_mid_stream")),
            GatewayError::Transcode(_) => Some((500, "transcode_failed")),
            GatewayError::DeadlineExceeded => Some((500, "session_deadline_exceeded")),
            GatewayError::SessionNotFound(_) => Some((404, "session_not_found")),
            GatewayError::Validation(_) => Some((400, "bad_request")),
            GatewayError::ClientDisconnected => None,
            _ => Some((500, "internal_error")),
        }
    }

    /// Close code sent after the terminal frame.
    pub fn close_code(&self) -> CloseCode {
        match self {
            GatewayError::QueueFull | GatewayError::CircuitOpen(_) | GatewayError::ShuttingDown => {
                CloseCode::TryAgainLater
            }
            GatewayError::RateLimited { .. } => CloseCode::RateLimited,
            GatewayError::Validation(_) | GatewayError::SessionNotFound(_) => CloseCode::BadRequest,
            GatewayError::ClientDisconnected => CloseCode::Normal,
            _ => CloseCode::Internal,
        }
    }

    /// Whether the pipeline may retry the provider for this error while no
    /// audio has been delivered yet.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Provider(_) | GatewayError::ProviderTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_payloads() {
        assert_eq!(
            GatewayError::CircuitOpen("p".into()).frame_payload(),
            Some((503, "provider_unavailable"))
        );
        assert_eq!(
            GatewayError::ProviderMidStream("eof".into()).frame_payload(),
            Some((502, "provider_mid_stream"))
        );
        assert_eq!(
            GatewayError::Transcode("bad rate".into()).frame_payload(),
            Some((500, "transcode_failed"))
        );
        assert_eq!(GatewayError::ClientDisconnected.frame_payload(), None);
    }

    #[test]
    fn test_close_codes() {
        assert_eq!(
            GatewayError::QueueFull.close_code(),
            CloseCode::TryAgainLater
        );
        assert_eq!(
            GatewayError::Transcode("x".into()).close_code(),
            CloseCode::Internal
        );
    }

    #[test]
    fn test_retryable() {
        assert!(GatewayError::Provider("boom".into()).is_retryable());
        assert!(GatewayError::ProviderTimeout(Duration::from_secs(5)).is_retryable());
        assert!(!GatewayError::Transcode("x".into()).is_retryable());
        assert!(!GatewayError::ClientDisconnected.is_retryable());
    }
}
