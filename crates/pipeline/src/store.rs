//! In-memory session store
//!
//! Source of truth for session lifecycle state. All mutations are atomic
//! per session and `update_status` enforces the monotonic transition graph:
//! illegal transitions fail without mutating anything.
//!
//! Terminal records are retained for a bounded time (and count) so clients
//! can introspect finished sessions and fetch completed audio; a background
//! cleanup task prunes them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::watch;

use tts_gateway_config::RetentionConfig;
use tts_gateway_core::{GatewayError, Session, SessionStatus};

/// Decoded audio retained for a completed session.
#[derive(Debug, Clone)]
pub struct RetainedAudio {
    /// PCM16 at the session's target sample rate
    pub pcm16: Vec<u8>,
    pub sample_rate_hz: u32,
}

struct Record {
    session: Session,
    audio: Option<RetainedAudio>,
}

/// In-memory map from session id to session record.
pub struct SessionStore {
    records: RwLock<HashMap<String, Record>>,
    retention: RetentionConfig,
}

impl SessionStore {
    pub fn new(retention: RetentionConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Insert a freshly created session.
    pub fn insert(&self, session: Session) {
        let mut records = self.records.write();
        records.insert(
            session.id.clone(),
            Record {
                session,
                audio: None,
            },
        );
    }

    /// Snapshot of a session by id.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.records.read().get(id).map(|r| r.session.clone())
    }

    /// Move a session along the status graph.
    ///
    /// Fails with `IllegalTransition` (leaving the record untouched) when
    /// the graph does not permit the move; this is what guarantees at most
    /// one worker ever holds `Streaming` ownership.
    pub fn update_status(
        &self,
        id: &str,
        next: SessionStatus,
        reason: Option<String>,
    ) -> Result<Session, GatewayError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| GatewayError::SessionNotFound(id.to_string()))?;

        let current = record.session.status;
        if !current.can_transition_to(next) {
            return Err(GatewayError::IllegalTransition {
                from: current,
                to: next,
            });
        }

        record.session.status = next;
        match next {
            SessionStatus::Streaming => record.session.started_at = Some(Utc::now()),
            s if s.is_terminal() => {
                record.session.finished_at = Some(Utc::now());
                record.session.failure_reason = reason;
            }
            _ => {}
        }

        tracing::debug!(session_id = id, from = %current, to = %next, "Session transition");
        Ok(record.session.clone())
    }

    /// Attach decoded audio to a session for the completed-audio route.
    /// No-op when audio retention is disabled.
    pub fn attach_audio(&self, id: &str, audio: RetainedAudio) {
        if !self.retention.keep_audio {
            return;
        }
        if let Some(record) = self.records.write().get_mut(id) {
            record.audio = Some(audio);
        }
    }

    /// Retained audio of a completed session.
    pub fn audio(&self, id: &str) -> Option<RetainedAudio> {
        let records = self.records.read();
        let record = records.get(id)?;
        if record.session.status != SessionStatus::Completed {
            return None;
        }
        record.audio.clone()
    }

    /// Remove a session record outright.
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.records.write().remove(id).map(|r| r.session)
    }

    pub fn count(&self) -> usize {
        self.records.read().len()
    }

    /// Drop terminal sessions past their TTL, then enforce the retained cap
    /// (oldest-finished first).
    pub fn prune(&self) -> usize {
        let ttl = chrono::Duration::seconds(self.retention.terminal_ttl_seconds as i64);
        let now = Utc::now();
        let mut records = self.records.write();
        let before = records.len();

        records.retain(|_, r| {
            if !r.session.status.is_terminal() {
                return true;
            }
            match r.session.finished_at {
                Some(finished) => now - finished < ttl,
                None => true,
            }
        });

        let terminal_count = records
            .values()
            .filter(|r| r.session.status.is_terminal())
            .count();
        if terminal_count > self.retention.max_terminal_sessions {
            let mut terminal: Vec<(String, chrono::DateTime<Utc>)> = records
                .values()
                .filter(|r| r.session.status.is_terminal())
                .map(|r| {
                    (
                        r.session.id.clone(),
                        r.session.finished_at.unwrap_or(r.session.created_at),
                    )
                })
                .collect();
            terminal.sort_by_key(|(_, finished)| *finished);

            let excess = terminal_count - self.retention.max_terminal_sessions;
            for (id, _) in terminal.into_iter().take(excess) {
                records.remove(&id);
            }
        }

        before - records.len()
    }

    /// Start the periodic cleanup task. Returns the shutdown sender.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = Arc::clone(self);
        let interval =
            std::time::Duration::from_secs(store.retention.cleanup_interval_seconds.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let pruned = store.prune();
                        if pruned > 0 {
                            tracing::info!(pruned, remaining = store.count(), "Session cleanup");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
