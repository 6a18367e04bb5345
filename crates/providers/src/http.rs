//! External synthesis HTTP API adapter
//!
//! Adapts a conventional request/response synthesis service to the lazy
//! chunk-stream contract. The upstream synthesizes the whole utterance in
//! one call (provider-side latency is accepted); the adapter slices the
//! returned PCM16 into fixed-size chunks and serves them lazily.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use tts_gateway_config::HttpProviderConfig;
use tts_gateway_core::{
    AudioChunk, AudioFormat, ChunkStream, GatewayError, SynthesisProvider, SynthesisRequest, Voice,
};

pub const PROVIDER_ID: &str = "http_synthesis";

const UPSTREAM_SAMPLE_RATE_HZ: u32 = 16000;

#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    text: &'a str,
    voice: &'a str,
    model: &'a str,
    format: &'static str,
    sample_rate_hz: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    /// Base64 PCM16 audio
    audio: String,
    #[serde(default)]
    sample_rate_hz: Option<u32>,
}

/// Adapter over an external synthesis HTTP API.
pub struct HttpSynthesisProvider {
    client: Client,
    config: HttpProviderConfig,
    voices: Vec<Voice>,
}

impl HttpSynthesisProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Internal(format!("http client init failed: {}", e)))?;

        let voices = config
            .languages
            .iter()
            .map(|language| {
                Voice::new(
                    format!("{}-{}", language, config.model),
                    format!("{} ({})", language, config.model),
                    language.clone(),
                    UPSTREAM_SAMPLE_RATE_HZ,
                    PROVIDER_ID,
                )
            })
            .collect();

        Ok(Self {
            client,
            config,
            voices,
        })
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, GatewayError> {
        let body = UpstreamRequest {
            text: &request.text,
            voice: &request.voice_id,
            model: &self.config.model,
            format: "pcm16",
            sample_rate_hz: UPSTREAM_SAMPLE_RATE_HZ,
            language: request.language.as_deref(),
        };

        let mut http = self.client.post(&self.config.endpoint).json(&body);
        if let Some(ref key) = self.config.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| GatewayError::Provider(format!("upstream request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Provider(format!(
                "upstream returned {}",
                status
            )));
        }

        let parsed: UpstreamResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Provider(format!("upstream response malformed: {}", e)))?;

        if let Some(rate) = parsed.sample_rate_hz {
            if rate != UPSTREAM_SAMPLE_RATE_HZ {
                tracing::warn!(
                    upstream_rate = rate,
                    expected = UPSTREAM_SAMPLE_RATE_HZ,
                    "Upstream sample rate differs from requested rate"
                );
            }
        }

        BASE64
            .decode(&parsed.audio)
            .map_err(|e| GatewayError::Provider(format!("upstream audio not base64: {}", e)))
    }
}

#[async_trait]
impl SynthesisProvider for HttpSynthesisProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn voices(&self) -> &[Voice] {
        &self.voices
    }

    async fn open_stream(&self, request: SynthesisRequest) -> Result<ChunkStream, GatewayError> {
        let pcm = self.synthesize(&request).await?;
        if pcm.is_empty() {
            return Err(GatewayError::Provider("upstream returned no audio".into()));
        }

        tracing::debug!(
            voice = %request.voice_id,
            bytes = pcm.len(),
            "Upstream synthesis complete, serving chunk stream"
        );

        // Keep chunk boundaries on sample boundaries.
        let chunk_bytes = (self.config.chunk_bytes.max(2) / 2) * 2;

        let stream = async_stream::try_stream! {
            let mut seq = 0u32;
            for window in pcm.chunks(chunk_bytes) {
                seq += 1;
                let mut chunk =
                    AudioChunk::new(window.to_vec(), AudioFormat::Pcm16, UPSTREAM_SAMPLE_RATE_HZ);
                chunk.sequence_hint = Some(seq);
                yield chunk;
                tokio::task::yield_now().await;
            }
        };

        let stream: ChunkStream = Box::pin(stream);
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voices_from_config() {
        let mut config = HttpProviderConfig::default();
        config.endpoint = "http://tts.internal/v1/synthesize".to_string();
        config.languages = vec!["en-US".to_string(), "fr-FR".to_string()];

        let provider = HttpSynthesisProvider::new(config).unwrap();
        assert_eq!(provider.voices().len(), 2);
        assert!(provider.voices().iter().all(|v| v.provider_id == PROVIDER_ID));
    }

    #[test]
    fn test_upstream_request_shape() {
        let body = UpstreamRequest {
            text: "hello",
            voice: "en-US-standard-v1",
            model: "standard-v1",
            format: "pcm16",
            sample_rate_hz: 16000,
            language: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"format\":\"pcm16\""));
        assert!(!json.contains("language"));
    }
}
