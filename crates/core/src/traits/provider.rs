//! Synthesis provider trait

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::audio::AudioChunk;
use crate::error::GatewayError;
use crate::voice::Voice;

/// Inputs for one synthesis stream.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub language: Option<String>,
}

/// A lazy, finite sequence of audio chunks.
///
/// Ends by natural exhaustion on success, or with an `Err` item on provider
/// failure. The pipeline pulls one chunk at a time with a per-pull timeout.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<AudioChunk, GatewayError>> + Send>>;

/// Polymorphic audio synthesizer.
///
/// Implementations:
/// - `MockToneProvider` - deterministic sine tone, used by tests and demos
/// - `HttpSynthesisProvider` - adapter over an external synthesis HTTP API
#[async_trait]
pub trait SynthesisProvider: Send + Sync + 'static {
    /// Stable provider identifier used in requests and breaker state.
    fn id(&self) -> &str;

    /// Voice catalog owned by this provider. Loaded once at startup.
    fn voices(&self) -> &[Voice];

    /// Open a chunk stream for one utterance.
    ///
    /// Chunks are emitted in the provider's base encoding. The call itself
    /// may be slow (provider-side latency is accepted); per-chunk timeouts
    /// are enforced by the caller.
    async fn open_stream(&self, request: SynthesisRequest) -> Result<ChunkStream, GatewayError>;
}

impl std::fmt::Debug for dyn SynthesisProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SynthesisProvider").field(&self.id()).finish()
    }
}
