//! Mock tone provider
//!
//! Deterministic sine-tone synthesis with no model dependency. Used by the
//! default configuration, demos, and the test suite.

use std::f32::consts::TAU;

use async_trait::async_trait;

use tts_gateway_config::MockToneConfig;
use tts_gateway_core::{
    AudioChunk, ChunkStream, GatewayError, SynthesisProvider, SynthesisRequest, Voice,
};

pub const PROVIDER_ID: &str = "mock_tone";

const NATIVE_SAMPLE_RATE_HZ: u32 = 16000;
const MIN_UTTERANCE_MS: u64 = 200;
const MAX_UTTERANCE_MS: u64 = 10_000;
const AMPLITUDE: f32 = 0.3;

/// Sine tone "synthesizer".
///
/// Utterance length scales with text length; each voice maps to a distinct
/// tone frequency so transcoded output is distinguishable by ear.
pub struct MockToneProvider {
    config: MockToneConfig,
    voices: Vec<Voice>,
}

impl MockToneProvider {
    pub fn new(config: MockToneConfig) -> Self {
        let voices = vec![
            Voice::new(
                "en-US-mock-1",
                "Mock English (low tone)",
                "en-US",
                NATIVE_SAMPLE_RATE_HZ,
                PROVIDER_ID,
            ),
            Voice::new(
                "en-US-mock-2",
                "Mock English (high tone)",
                "en-US",
                NATIVE_SAMPLE_RATE_HZ,
                PROVIDER_ID,
            ),
            Voice::new(
                "de-DE-mock-1",
                "Mock German",
                "de-DE",
                NATIVE_SAMPLE_RATE_HZ,
                PROVIDER_ID,
            ),
        ];

        Self { config, voices }
    }

    fn tone_frequency(voice_id: &str) -> f32 {
        match voice_id {
            "en-US-mock-2" => 660.0,
            "de-DE-mock-1" => 550.0,
            _ => 440.0,
        }
    }

    /// Total utterance duration for a given text, clamped to sane bounds.
    fn utterance_ms(&self, text: &str) -> u64 {
        let chars = text.trim().chars().count() as u64;
        (chars * self.config.ms_per_char).clamp(MIN_UTTERANCE_MS, MAX_UTTERANCE_MS)
    }
}

#[async_trait]
impl SynthesisProvider for MockToneProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn voices(&self) -> &[Voice] {
        &self.voices
    }

    async fn open_stream(&self, request: SynthesisRequest) -> Result<ChunkStream, GatewayError> {
        if !self.voices.iter().any(|v| v.id == request.voice_id) {
            return Err(GatewayError::UnknownVoice(request.voice_id));
        }

        let frequency = Self::tone_frequency(&request.voice_id);
        let total_ms = self.utterance_ms(&request.text);
        let chunk_ms = self.config.chunk_ms.max(1);
        let chunk_samples = (NATIVE_SAMPLE_RATE_HZ as u64 * chunk_ms / 1000) as usize;
        let total_samples = (NATIVE_SAMPLE_RATE_HZ as u64 * total_ms / 1000) as usize;

        let stream = async_stream::try_stream! {
            let mut emitted = 0usize;
            let mut seq = 0u32;
            let step = TAU * frequency / NATIVE_SAMPLE_RATE_HZ as f32;

            while emitted < total_samples {
                let len = chunk_samples.min(total_samples - emitted);
                let samples: Vec<f32> = (0..len)
                    .map(|i| AMPLITUDE * (step * (emitted + i) as f32).sin())
                    .collect();
                emitted += len;
                seq += 1;

                let mut chunk = AudioChunk::from_f32_samples(&samples, NATIVE_SAMPLE_RATE_HZ);
                chunk.sequence_hint = Some(seq);
                yield chunk;

                // Keep the sequence lazy: hand control back between chunks.
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
    use futures::StreamExt;

    fn provider() -> MockToneProvider {
        MockToneProvider::new(MockToneConfig::default())
    }

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice_id: "en-US-mock-1".to_string(),
            language: None,
        }
    }

    #[tokio::test]
    async fn test_stream_yields_at_least_one_chunk() {
        let mut stream = provider().open_stream(request("hi")).await.unwrap();

        let mut count = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            assert_eq!(chunk.sample_rate_hz, NATIVE_SAMPLE_RATE_HZ);
            assert!(!chunk.data.is_empty());
            count += 1;
        }
        assert!(count >= 1);
    }

    #[tokio::test]
    async fn test_longer_text_yields_more_chunks() {
        let short = count_chunks("hi").await;
        let long = count_chunks("a considerably longer utterance to synthesize").await;
        assert!(long > short);
    }

    async fn count_chunks(text: &str) -> usize {
        let mut stream = provider().open_stream(request(text)).await.unwrap();
        let mut count = 0;
        while stream.next().await.is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_unknown_voice_rejected() {
        let err = provider()
            .open_stream(SynthesisRequest {
                text: "hi".to_string(),
                voice_id: "xx-XX-nope".to_string(),
                language: None,
            })
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::UnknownVoice(_)));
    }

    #[tokio::test]
    async fn test_chunks_are_nonsilent_pcm16() {
        let mut stream = provider().open_stream(request("tone")).await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        let samples = tts_gateway_core::audio::pcm16_to_f32(&chunk.data);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.1, "expected an audible tone, peak {}", peak);
    }
}
