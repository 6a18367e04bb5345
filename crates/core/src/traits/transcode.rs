//! Audio transcoder trait

use async_trait::async_trait;

use crate::audio::{AudioChunk, AudioFormat, AudioSpec};
use crate::error::GatewayError;

/// Converts one raw chunk from a provider's base encoding into the target
/// encoding and sample rate.
///
/// One chunk in, one buffer out; the pipeline never coalesces or splits
/// across this boundary. Implementations must not block the async scheduler:
/// CPU-bound or external-process work is offloaded internally.
#[async_trait]
pub trait AudioTranscoder: Send + Sync + 'static {
    async fn transcode(
        &self,
        chunk: &AudioChunk,
        target: &AudioSpec,
    ) -> Result<Vec<u8>, GatewayError>;

    /// Target formats this transcoder can produce.
    fn supported_targets(&self) -> &[AudioFormat];
}
