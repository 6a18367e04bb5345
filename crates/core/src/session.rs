//! Session lifecycle types
//!
//! A session tracks a single utterance from admission to its terminal state.
//! Status moves monotonically along the transition graph; there is no way
//! back from a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::{AudioFormat, AudioSpec};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Admitted, waiting for the client to connect its stream
    Pending,
    /// A worker owns the session and is driving the pipeline
    Streaming,
    /// All audio delivered, `eos` sent
    Completed,
    /// Terminal failure, `error` frame sent
    Failed,
    /// Client went away; no terminal frame
    Cancelled,
}

impl SessionStatus {
    /// Whether the status graph permits moving to `next`.
    ///
    /// Legal paths: Pending -> Streaming -> {Completed, Failed, Cancelled}
    /// and Pending -> Cancelled.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, Streaming)
                | (Pending, Cancelled)
                | (Streaming, Completed)
                | (Streaming, Failed)
                | (Streaming, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Validated request body for session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub provider: String,
    pub voice: String,
    pub text: String,
    pub target_format: AudioFormat,
    pub sample_rate_hz: u32,
    #[serde(default)]
    pub language: Option<String>,
}

/// One utterance's lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque, unique, client-unpredictable id
    pub id: String,
    pub provider_id: String,
    pub voice_id: String,
    pub language: Option<String>,
    pub text: String,
    pub target_spec: AudioSpec,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl Session {
    /// Create a fresh `Pending` session from a validated request.
    pub fn new(request: &CreateSessionRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: request.provider.clone(),
            voice_id: request.voice.clone(),
            language: request.language.clone(),
            text: request.text.trim().to_string(),
            target_spec: AudioSpec::new(request.target_format, request.sample_rate_hz),
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            failure_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateSessionRequest {
        CreateSessionRequest {
            provider: "mock_tone".to_string(),
            voice: "en-US-mock-1".to_string(),
            text: "  hello  ".to_string(),
            target_format: AudioFormat::Pcm16,
            sample_rate_hz: 16000,
            language: None,
        }
    }

    #[test]
    fn test_new_session_is_pending() {
        let session = Session::new(&request());
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.text, "hello");
        assert!(session.started_at.is_none());
        assert!(!session.id.is_empty());
    }

    #[test]
    fn test_session_ids_unique() {
        let a = Session::new(&request());
        let b = Session::new(&request());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_legal_transitions() {
        use SessionStatus::*;
        assert!(Pending.can_transition_to(Streaming));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Streaming.can_transition_to(Completed));
        assert!(Streaming.can_transition_to(Failed));
        assert!(Streaming.can_transition_to(Cancelled));
    }

    #[test]
    fn test_illegal_transitions() {
        use SessionStatus::*;
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Streaming.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Streaming));
        assert!(!Cancelled.can_transition_to(Streaming));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn test_terminal_states() {
        use SessionStatus::*;
        assert!(!Pending.is_terminal());
        assert!(!Streaming.is_terminal());
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(Cancelled.is_terminal());
    }
}
