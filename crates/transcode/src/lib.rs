//! Audio transcoding between wire formats
//!
//! Every target format is reachable from the `pcm16` base: decode, resample
//! to the target rate, then encode. Each call is independent (no long-lived
//! codec state), and the whole conversion runs on the blocking thread pool
//! so a slow transcode never stalls the async scheduler.
//!
//! `mp3` and `opus` targets shell out to an external codec binary per chunk,
//! trading per-chunk overhead for simplicity and error isolation.

mod external;
mod mulaw;
mod resample;

pub use mulaw::encode_mulaw;

use std::sync::Arc;

use async_trait::async_trait;

use tts_gateway_config::TranscoderConfig;
use tts_gateway_core::audio::{f32_to_pcm16, pcm16_to_f32};
use tts_gateway_core::{AudioChunk, AudioFormat, AudioSpec, AudioTranscoder, GatewayError};

/// Transcoder covering the gateway's supported format matrix.
pub struct GatewayTranscoder {
    config: Arc<TranscoderConfig>,
}

impl GatewayTranscoder {
    pub fn new(config: TranscoderConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Synchronous conversion body, run on the blocking pool.
    fn convert(
        config: &TranscoderConfig,
        chunk: &AudioChunk,
        target: &AudioSpec,
    ) -> Result<Vec<u8>, GatewayError> {
        if chunk.format != AudioFormat::Pcm16 {
            return Err(GatewayError::Transcode(format!(
                "unsupported source format: {}",
                chunk.format
            )));
        }

        // Resample in the f32 domain when rates differ.
        let pcm = if chunk.sample_rate_hz == target.sample_rate_hz {
            chunk.data.clone()
        } else {
            let samples = pcm16_to_f32(&chunk.data);
            let resampled =
                resample::resample(&samples, chunk.sample_rate_hz, target.sample_rate_hz)?;
            f32_to_pcm16(&resampled)
        };

        match target.format {
            // A streamed wav target is raw PCM frames; the container header
            // belongs to the completed-session file route, not the stream.
            AudioFormat::Pcm16 | AudioFormat::Wav => Ok(pcm),
            AudioFormat::Mulaw => Ok(encode_mulaw(&pcm)),
            AudioFormat::Mp3 | AudioFormat::Opus => {
                external::encode(config, &pcm, target.sample_rate_hz, target.format)
            }
        }
    }
}

#[async_trait]
impl AudioTranscoder for GatewayTranscoder {
    async fn transcode(
        &self,
        chunk: &AudioChunk,
        target: &AudioSpec,
    ) -> Result<Vec<u8>, GatewayError> {
        let config = Arc::clone(&self.config);
        let chunk = chunk.clone();
        let target = *target;

        tokio::task::spawn_blocking(move || Self::convert(&config, &chunk, &target))
            .await
            .map_err(|e| GatewayError::Transcode(format!("transcode task failed: {}", e)))?
    }

    fn supported_targets(&self) -> &[AudioFormat] {
        &AudioFormat::SUPPORTED
    }
}
