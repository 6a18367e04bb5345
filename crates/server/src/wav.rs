//! WAV container assembly for the completed-session audio route
//!
//! Streamed `wav` sessions carry raw PCM frames; a self-contained file with
//! a RIFF header is only produced here, from the audio retained for a
//! completed session.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use tts_gateway_core::GatewayError;

/// Wrap mono PCM16 bytes in a WAV container.
pub fn pcm16_to_wav(pcm16: &[u8], sample_rate_hz: u32) -> Result<Vec<u8>, GatewayError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| GatewayError::Internal(format!("wav writer init failed: {}", e)))?;

        for pair in pcm16.chunks_exact(2) {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            writer
                .write_sample(sample)
                .map_err(|e| GatewayError::Internal(format!("wav write failed: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| GatewayError::Internal(format!("wav finalize failed: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_has_riff_header() {
        let pcm: Vec<u8> = vec![0u8; 640];
        let wav = pcm16_to_wav(&pcm, 16000).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header plus the payload.
        assert_eq!(wav.len(), 44 + pcm.len());
    }

    #[test]
    fn test_empty_audio_still_valid() {
        let wav = pcm16_to_wav(&[], 8000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
    }
}
