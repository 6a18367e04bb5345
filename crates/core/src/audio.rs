//! Audio chunk types and PCM utilities

use serde::{Deserialize, Serialize};

/// Audio encoding formats carried over the wire.
///
/// `Pcm16` is the base format every provider emits; the remaining formats are
/// reachable from it through the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// 16-bit signed PCM (little-endian)
    #[default]
    Pcm16,
    /// G.711 mu-law (telephony)
    Mulaw,
    /// Opus codec
    Opus,
    /// MPEG layer III
    Mp3,
    /// Raw PCM frames of a WAV stream (no container header while streaming)
    Wav,
}

impl AudioFormat {
    /// All formats a client may request as a target.
    pub const SUPPORTED: [AudioFormat; 5] = [
        AudioFormat::Pcm16,
        AudioFormat::Mulaw,
        AudioFormat::Opus,
        AudioFormat::Mp3,
        AudioFormat::Wav,
    ];

    /// Wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Pcm16 => "pcm16",
            AudioFormat::Mulaw => "mulaw",
            AudioFormat::Opus => "opus",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    /// Parse a wire name. Returns `None` for unknown formats.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pcm16" => Some(AudioFormat::Pcm16),
            "mulaw" => Some(AudioFormat::Mulaw),
            "opus" => Some(AudioFormat::Opus),
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target encoding and sample rate for a transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    pub format: AudioFormat,
    pub sample_rate_hz: u32,
}

impl AudioSpec {
    pub fn new(format: AudioFormat, sample_rate_hz: u32) -> Self {
        Self {
            format,
            sample_rate_hz,
        }
    }
}

/// A small immutable buffer of audio produced by a provider.
///
/// Consumed at most once by the pipeline; the transcoder reads it, the
/// framed payload is derived from it, and it is then dropped.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw encoded bytes
    pub data: Vec<u8>,
    /// Encoding of `data`
    pub format: AudioFormat,
    /// Sample rate of `data`
    pub sample_rate_hz: u32,
    /// Provider-side ordering hint, if the provider numbers its chunks
    pub sequence_hint: Option<u32>,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>, format: AudioFormat, sample_rate_hz: u32) -> Self {
        Self {
            data,
            format,
            sample_rate_hz,
            sequence_hint: None,
        }
    }

    /// Build a PCM16 chunk from normalized f32 samples.
    pub fn from_f32_samples(samples: &[f32], sample_rate_hz: u32) -> Self {
        Self::new(f32_to_pcm16(samples), AudioFormat::Pcm16, sample_rate_hz)
    }

    /// Duration of a PCM16 mono chunk, or `None` for encoded formats.
    pub fn duration_ms(&self) -> Option<u64> {
        match self.format {
            AudioFormat::Pcm16 | AudioFormat::Wav => {
                let samples = (self.data.len() / 2) as u64;
                Some(samples * 1000 / self.sample_rate_hz as u64)
            }
            _ => None,
        }
    }
}

const PCM16_NORMALIZE: f32 = 32768.0;
const PCM16_SCALE: f32 = 32767.0;

/// Decode little-endian PCM16 bytes into normalized f32 samples.
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            sample as f32 / PCM16_NORMALIZE
        })
        .collect()
}

/// Encode normalized f32 samples into little-endian PCM16 bytes.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            let clamped = sample.clamp(-1.0, 1.0);
            let pcm16 = (clamped * PCM16_SCALE) as i16;
            pcm16.to_le_bytes()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_roundtrip() {
        for format in AudioFormat::SUPPORTED {
            assert_eq!(AudioFormat::parse(format.as_str()), Some(format));
        }
        assert_eq!(AudioFormat::parse("flac"), None);
    }

    #[test]
    fn test_pcm16_roundtrip() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0, -1.0];
        let bytes = f32_to_pcm16(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);

        let decoded = pcm16_to_f32(&bytes);
        for (a, b) in samples.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 0.001, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_chunk_duration() {
        // 320 bytes = 160 samples = 10ms at 16kHz
        let chunk = AudioChunk::new(vec![0u8; 320], AudioFormat::Pcm16, 16000);
        assert_eq!(chunk.duration_ms(), Some(10));

        let encoded = AudioChunk::new(vec![0u8; 320], AudioFormat::Mp3, 16000);
        assert_eq!(encoded.duration_ms(), None);
    }
}
