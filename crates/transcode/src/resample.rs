//! Sample-rate conversion
//!
//! FFT-based resampling via Rubato, with a linear-interpolation fallback for
//! frames too short for the FFT resampler.

use rubato::{FftFixedIn, Resampler};

use tts_gateway_core::GatewayError;

/// Minimum frame length for the FFT path.
const FFT_MIN_SAMPLES: usize = 64;

/// Resample mono f32 samples from `from_rate` to `to_rate`.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, GatewayError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(GatewayError::Transcode(format!(
            "invalid sample rates: {} -> {}",
            from_rate, to_rate
        )));
    }

    if samples.len() < FFT_MIN_SAMPLES {
        return Ok(resample_linear(samples, from_rate, to_rate));
    }

    let chunk_size = samples.len().min(1024);
    let samples_f64: Vec<f64> = samples.iter().map(|&s| s as f64).collect();

    match FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, 2, 1) {
        Ok(mut resampler) => {
            let mut output = Vec::new();
            for frame in samples_f64.chunks(chunk_size) {
                let input = if frame.len() == chunk_size {
                    vec![frame.to_vec()]
                } else {
                    // Zero-pad the tail frame to the fixed input size.
                    let mut padded = frame.to_vec();
                    padded.resize(chunk_size, 0.0);
                    vec![padded]
                };

                match resampler.process(&input, None) {
                    Ok(frames) => output.extend(frames[0].iter().map(|&s| s as f32)),
                    Err(e) => {
                        tracing::warn!("Rubato processing failed, using linear fallback: {}", e);
                        return Ok(resample_linear(samples, from_rate, to_rate));
                    }
                }
            }
            Ok(output)
        }
        Err(e) => {
            tracing::warn!("Rubato init failed, using linear fallback: {}", e);
            Ok(resample_linear(samples, from_rate, to_rate))
        }
    }
}

/// Linear interpolation fallback for edge cases.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;

    let mut resampled = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx_floor = src_idx.floor() as usize;
        let idx_ceil = (idx_floor + 1).min(samples.len().saturating_sub(1));
        let frac = src_idx - idx_floor as f64;

        let sample =
            samples[idx_floor] * (1.0 - frac as f32) + samples[idx_ceil] * frac as f32;
        resampled.push(sample);
    }

    resampled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let samples = vec![0.1f32, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000).unwrap(), samples);
    }

    #[test]
    fn test_downsample_length() {
        let samples = vec![0.0f32; 1600]; // 100ms at 16kHz
        let out = resample(&samples, 16000, 8000).unwrap();
        let expected = 800usize;
        assert!(
            out.len().abs_diff(expected) <= expected / 10,
            "expected ~{}, got {}",
            expected,
            out.len()
        );
    }

    #[test]
    fn test_short_frame_uses_linear() {
        let samples = vec![0.5f32; 10];
        let out = resample(&samples, 16000, 8000).unwrap();
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(resample(&[0.0; 128], 0, 8000).is_err());
    }
}
