//! TTS service: admission and the per-session streaming pipeline
//!
//! `create_session` gates admission (rate limit, validation) and persists a
//! `Pending` session. `stream` is the worker-side driver: it claims
//! streaming ownership, opens the provider behind the circuit breaker, and
//! pumps chunks through the transcoder to the transport one at a time.
//!
//! Cancellation is cooperative and observed at three checkpoints: before
//! each provider pull, between pull and transcode, and between transcode
//! and send. The transport send is the back-pressure point; nothing buffers
//! between the transcoder and the wire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use rand::Rng;
use tokio::sync::watch;

use tts_gateway_config::{PipelineConfig, ValidationConfig};
use tts_gateway_core::{
    AudioFormat, AudioTranscoder, CreateSessionRequest, FrameTransport, GatewayError, Result,
    Session, SessionStatus, StreamFrame, SynthesisRequest,
};
use tts_gateway_providers::ProviderRegistry;

use crate::breaker::{BreakerLease, CircuitBreaker};
use crate::rate_limit::{Admission, FixedWindowLimiter};
use crate::store::{RetainedAudio, SessionStore};

const MAX_SAMPLE_RATE_HZ: u32 = 192_000;

/// How a pipeline run ended. The driver translates this into the terminal
/// frame, the close code, and the session's final status.
enum PipelineOutcome {
    Completed { retained: Option<RetainedAudio> },
    Failed(GatewayError),
    Cancelled(&'static str),
}

/// Orchestrates session creation, admission, and per-session pipelines.
pub struct TtsService {
    registry: Arc<ProviderRegistry>,
    store: Arc<SessionStore>,
    breaker: CircuitBreaker,
    transcoder: Arc<dyn AudioTranscoder>,
    limiter: Arc<FixedWindowLimiter>,
    pipeline: PipelineConfig,
    validation: ValidationConfig,
    keep_audio: bool,
}

impl TtsService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<SessionStore>,
        breaker: CircuitBreaker,
        transcoder: Arc<dyn AudioTranscoder>,
        limiter: Arc<FixedWindowLimiter>,
        pipeline: PipelineConfig,
        validation: ValidationConfig,
        keep_audio: bool,
    ) -> Self {
        Self {
            registry,
            store,
            breaker,
            transcoder,
            limiter,
            pipeline,
            validation,
            keep_audio,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }

    /// Admit and persist a new session.
    ///
    /// Admission is a pure function of the request body and the current
    /// rate-limit state; every error kind is distinct so the HTTP layer can
    /// map statuses without string matching.
    pub fn create_session(&self, origin: &str, request: &CreateSessionRequest) -> Result<Session> {
        if let Admission::Denied { retry_after_s } = self.limiter.admit(origin) {
            return Err(GatewayError::RateLimited { retry_after_s });
        }

        if request.text.trim().is_empty() {
            return Err(GatewayError::Validation("text must not be empty".into()));
        }
        if request.sample_rate_hz == 0 || request.sample_rate_hz > MAX_SAMPLE_RATE_HZ {
            return Err(GatewayError::Validation(format!(
                "sample_rate_hz must be in (0, {}]",
                MAX_SAMPLE_RATE_HZ
            )));
        }

        self.registry.resolve(&request.provider)?;

        let voice = self
            .registry
            .find_voice(&request.voice)
            .ok_or_else(|| GatewayError::UnknownVoice(request.voice.clone()))?;
        if self.validation.enforce_voice_ownership && voice.provider_id != request.provider {
            return Err(GatewayError::UnknownVoice(format!(
                "{} does not belong to provider {}",
                request.voice, request.provider
            )));
        }

        let session = Session::new(request);
        self.store.insert(session.clone());
        metrics::counter!("sessions_created_total").increment(1);

        tracing::info!(
            session_id = %session.id,
            provider = %session.provider_id,
            voice = %session.voice_id,
            format = %session.target_spec.format,
            rate = session.target_spec.sample_rate_hz,
            "Session created"
        );

        Ok(session)
    }

    /// Drive one queued session to a terminal state.
    ///
    /// Owns the transport and closes it on every exit path.
    pub async fn stream(
        &self,
        session_id: &str,
        mut transport: Box<dyn FrameTransport>,
        shutdown: watch::Receiver<bool>,
    ) {
        // A client that disconnected while the session sat in the queue is
        // observed here, before any provider work.
        if !transport.is_alive() {
            self.settle_cancelled(session_id, "client_disconnected_before_start");
            let _ = transport.close(tts_gateway_core::CloseCode::Normal).await;
            return;
        }

        let session = match self.store.update_status(session_id, SessionStatus::Streaming, None) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(session_id, error = %err, "Session not streamable");
                self.send_terminal_error(&mut transport, &err).await;
                return;
            }
        };

        let outcome = self.run_pipeline(&session, transport.as_mut(), &shutdown).await;

        match outcome {
            PipelineOutcome::Completed { retained } => {
                if let Some(audio) = retained {
                    self.store.attach_audio(session_id, audio);
                }
                let _ = self
                    .store
                    .update_status(session_id, SessionStatus::Completed, None);
                metrics::counter!("sessions_completed_total").increment(1);
                let _ = transport.close(tts_gateway_core::CloseCode::Normal).await;
                tracing::info!(session_id, "Session completed");
            }
            PipelineOutcome::Failed(err) => {
                let reason = err
                    .frame_payload()
                    .map(|(_, m)| m.to_string())
                    .unwrap_or_else(|| err.to_string());
                let _ = self
                    .store
                    .update_status(session_id, SessionStatus::Failed, Some(reason));
                metrics::counter!("sessions_failed_total").increment(1);
                self.send_terminal_error(&mut transport, &err).await;
                tracing::warn!(session_id, error = %err, "Session failed");
            }
            PipelineOutcome::Cancelled(reason) => {
                let _ = self.store.update_status(
                    session_id,
                    SessionStatus::Cancelled,
                    Some(reason.to_string()),
                );
                metrics::counter!("sessions_cancelled_total").increment(1);
                // No terminal frame on cancellation; close quietly.
                let _ = transport.close(tts_gateway_core::CloseCode::Normal).await;
                tracing::info!(session_id, reason, "Session cancelled");
            }
        }
    }

    /// The per-session pipeline: provider -> transcoder -> transport.
    ///
    /// Strictly sequential within a session: one outstanding pull, one
    /// transcode, one send at a time. Settles the breaker lease on every
    /// provider-attributable path and abandons it otherwise.
    async fn run_pipeline(
        &self,
        session: &Session,
        transport: &mut dyn FrameTransport,
        shutdown: &watch::Receiver<bool>,
    ) -> PipelineOutcome {
        let provider = match self.registry.resolve(&session.provider_id) {
            Ok(provider) => provider,
            Err(err) => return PipelineOutcome::Failed(err),
        };

        let Some(lease) = self.breaker.permit(provider.id()) else {
            return PipelineOutcome::Failed(GatewayError::CircuitOpen(
                session.provider_id.clone(),
            ));
        };
        let mut lease = Some(lease);

        let request = SynthesisRequest {
            text: session.text.clone(),
            voice_id: session.voice_id.clone(),
            language: session.language.clone(),
        };

        let chunk_timeout = Duration::from_millis(self.pipeline.chunk_timeout_ms);
        let deadline = self
            .pipeline
            .session_deadline_seconds
            .map(|s| Instant::now() + Duration::from_secs(s));

        let retain = self.keep_audio
            && matches!(
                session.target_spec.format,
                AudioFormat::Pcm16 | AudioFormat::Wav
            );
        let mut retained: Vec<u8> = Vec::new();

        let mut seq: u32 = 0;
        let mut attempt: u32 = 0;
        let mut backoff = Duration::from_millis(self.pipeline.initial_backoff_ms);

        'attempts: loop {
            attempt += 1;

            let mut chunks = match provider.open_stream(request.clone()).await {
                Ok(chunks) => chunks,
                Err(err) => {
                    if err.is_retryable() && seq == 0 && attempt < self.pipeline.max_attempts {
                        tracing::warn!(
                            session_id = %session.id,
                            attempt,
                            error = %err,
                            "Provider open failed, retrying"
                        );
                        backoff = backoff_sleep(backoff).await;
                        continue 'attempts;
                    }
                    settle_failure(&mut lease);
                    return PipelineOutcome::Failed(err);
                }
            };

            loop {
                // Checkpoint: before requesting the next chunk.
                if let Some(outcome) = self.checkpoint(transport, shutdown, deadline) {
                    return outcome;
                }

                let pulled = tokio::time::timeout(chunk_timeout, chunks.next()).await;
                let chunk = match pulled {
                    Err(_) => {
                        if seq == 0 && attempt < self.pipeline.max_attempts {
                            tracing::warn!(
                                session_id = %session.id,
                                attempt,
                                "Provider pull timed out, retrying"
                            );
                            backoff = backoff_sleep(backoff).await;
                            continue 'attempts;
                        }
                        settle_failure(&mut lease);
                        let err = if seq > 0 {
                            GatewayError::ProviderMidStream("pull timed out".into())
                        } else {
                            GatewayError::ProviderTimeout(chunk_timeout)
                        };
                        return PipelineOutcome::Failed(err);
                    }
                    Ok(Some(Err(err))) => {
                        if err.is_retryable() && seq == 0 && attempt < self.pipeline.max_attempts {
                            tracing::warn!(
                                session_id = %session.id,
                                attempt,
                                error = %err,
                                "Provider error before first frame, retrying"
                            );
                            backoff = backoff_sleep(backoff).await;
                            continue 'attempts;
                        }
                        settle_failure(&mut lease);
                        let err = if seq > 0 {
                            GatewayError::ProviderMidStream(err.to_string())
                        } else {
                            err
                        };
                        return PipelineOutcome::Failed(err);
                    }
                    Ok(None) => {
                        if seq == 0 {
                            // A finite sequence with zero chunks is a
                            // provider anomaly, not a successful stream.
                            if attempt < self.pipeline.max_attempts {
                                backoff = backoff_sleep(backoff).await;
                                continue 'attempts;
                            }
                            settle_failure(&mut lease);
                            return PipelineOutcome::Failed(GatewayError::Provider(
                                "provider produced no audio".into(),
                            ));
                        }
                        if transport.send(StreamFrame::Eos).await.is_err() {
                            return PipelineOutcome::Cancelled("client_disconnected");
                        }
                        if let Some(lease) = lease.take() {
                            lease.record_success();
                        }
                        let retained = retain.then(|| RetainedAudio {
                            pcm16: std::mem::take(&mut retained),
                            sample_rate_hz: session.target_spec.sample_rate_hz,
                        });
                        return PipelineOutcome::Completed { retained };
                    }
                    Ok(Some(Ok(chunk))) => chunk,
                };

                // Checkpoint: between pull and transcode.
                if let Some(outcome) = self.checkpoint(transport, shutdown, deadline) {
                    return outcome;
                }

                let payload = match self
                    .transcoder
                    .transcode(&chunk, &session.target_spec)
                    .await
                {
                    Ok(payload) => payload,
                    Err(err) => {
                        // Not a provider fault; the lease is abandoned.
                        return PipelineOutcome::Failed(err);
                    }
                };

                // Checkpoint: between transcode and send.
                if let Some(outcome) = self.checkpoint(transport, shutdown, deadline) {
                    return outcome;
                }

                if transport
                    .send(StreamFrame::audio(seq + 1, &payload))
                    .await
                    .is_err()
                {
                    return PipelineOutcome::Cancelled("client_disconnected");
                }
                seq += 1;
                metrics::counter!("audio_frames_sent_total").increment(1);

                if retain {
                    retained.extend_from_slice(&payload);
                }
            }
        }
    }

    /// Cooperative cancellation checkpoint. Returns the outcome that ends
    /// the pipeline, or `None` to keep going.
    fn checkpoint(
        &self,
        transport: &dyn FrameTransport,
        shutdown: &watch::Receiver<bool>,
        deadline: Option<Instant>,
    ) -> Option<PipelineOutcome> {
        if !transport.is_alive() {
            return Some(PipelineOutcome::Cancelled("client_disconnected"));
        }
        if *shutdown.borrow() {
            return Some(PipelineOutcome::Failed(GatewayError::ShuttingDown));
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Some(PipelineOutcome::Failed(GatewayError::DeadlineExceeded));
            }
        }
        None
    }

    fn settle_cancelled(&self, session_id: &str, reason: &str) {
        let _ = self.store.update_status(
            session_id,
            SessionStatus::Cancelled,
            Some(reason.to_string()),
        );
        metrics::counter!("sessions_cancelled_total").increment(1);
        tracing::info!(session_id, reason, "Session cancelled before streaming");
    }

    async fn send_terminal_error(
        &self,
        transport: &mut Box<dyn FrameTransport>,
        err: &GatewayError,
    ) {
        if let Some((code, message)) = err.frame_payload() {
            let _ = transport.send(StreamFrame::error(code, message)).await;
        }
        let _ = transport.close(err.close_code()).await;
    }
}

fn settle_failure(lease: &mut Option<BreakerLease>) {
    if let Some(lease) = lease.take() {
        lease.record_failure();
    }
}

/// Sleep for the current backoff (with +/-25% jitter) and return the next,
/// doubled backoff.
async fn backoff_sleep(backoff: Duration) -> Duration {
    let jitter = rand::thread_rng().gen_range(0.75..1.25);
    tokio::time::sleep(backoff.mul_f64(jitter)).await;
    backoff * 2
}
