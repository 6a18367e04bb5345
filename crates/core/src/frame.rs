//! Wire frame envelopes for the streaming transport
//!
//! Every frame is one JSON object per transport message. The server is the
//! only sender; a session's frame stream is `audio(1..=k)` followed by
//! exactly one terminal frame.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

/// A single envelope message sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// Audio payload; `seq` starts at 1 and is strictly monotonic per session.
    Audio { seq: u32, data: String },
    /// Terminal success.
    Eos,
    /// Terminal failure; the server closes the transport after sending it.
    Error { code: u16, message: String },
}

impl StreamFrame {
    /// Build an audio frame, base64-encoding the payload.
    pub fn audio(seq: u32, payload: &[u8]) -> Self {
        StreamFrame::Audio {
            seq,
            data: BASE64.encode(payload),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        StreamFrame::Error {
            code,
            message: message.into(),
        }
    }

    /// Decoded audio payload, or `None` for non-audio frames.
    pub fn payload(&self) -> Option<Vec<u8>> {
        match self {
            StreamFrame::Audio { data, .. } => BASE64.decode(data).ok(),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::Eos | StreamFrame::Error { .. })
    }
}

/// Transport close codes used by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000 - normal completion
    Normal,
    /// 1011 - internal error
    Internal,
    /// 1013 - try again later (overload, breaker open, shutdown)
    TryAgainLater,
    /// 4400 - bad request
    BadRequest,
    /// 4403 - rate limited
    RateLimited,
}

impl CloseCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Internal => 1011,
            CloseCode::TryAgainLater => 1013,
            CloseCode::BadRequest => 4400,
            CloseCode::RateLimited => 4403,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_frame_json() {
        let frame = StreamFrame::audio(1, b"\x01\x02\x03");
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"audio\""));
        assert!(json.contains("\"seq\":1"));

        let parsed: StreamFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.payload().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_eos_frame_json() {
        let json = serde_json::to_string(&StreamFrame::Eos).unwrap();
        assert_eq!(json, r#"{"type":"eos"}"#);
    }

    #[test]
    fn test_error_frame_json() {
        let frame = StreamFrame::error(503, "provider_unavailable");
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: StreamFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame);
        assert!(parsed.is_terminal());
    }

    #[test]
    fn test_close_codes() {
        assert_eq!(CloseCode::Normal.as_u16(), 1000);
        assert_eq!(CloseCode::TryAgainLater.as_u16(), 1013);
        assert_eq!(CloseCode::RateLimited.as_u16(), 4403);
    }
}
