//! External codec process invocation
//!
//! `mp3` and `opus` targets are produced by a one-shot external codec
//! invocation per chunk. Callers run this on the blocking pool; the child
//! process reads raw PCM16 on stdin and writes the encoded chunk to stdout.

use std::io::Write;
use std::process::{Command, Stdio};

use tts_gateway_config::TranscoderConfig;
use tts_gateway_core::{AudioFormat, GatewayError};

/// Encode a PCM16 buffer into `target` via the configured codec binary.
pub fn encode(
    config: &TranscoderConfig,
    pcm16: &[u8],
    sample_rate_hz: u32,
    target: AudioFormat,
) -> Result<Vec<u8>, GatewayError> {
    let (muxer, codec_args): (&str, &[&str]) = match target {
        AudioFormat::Mp3 => ("mp3", &["-b:a", "64k"]),
        AudioFormat::Opus => ("ogg", &["-c:a", "libopus", "-b:a", "48k"]),
        other => {
            return Err(GatewayError::Transcode(format!(
                "no external codec path for {}",
                other
            )))
        }
    };

    let rate = sample_rate_hz.to_string();
    let mut child = Command::new(&config.codec_binary)
        .args(["-hide_banner", "-loglevel", "error"])
        .args(["-f", "s16le", "-ar", &rate, "-ac", "1", "-i", "pipe:0"])
        .args(codec_args)
        .args(["-f", muxer, "pipe:1"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            GatewayError::Transcode(format!(
                "failed to spawn codec binary {}: {}",
                config.codec_binary, e
            ))
        })?;

    child
        .stdin
        .take()
        .ok_or_else(|| GatewayError::Transcode("codec stdin unavailable".into()))?
        .write_all(pcm16)
        .map_err(|e| GatewayError::Transcode(format!("failed to feed codec: {}", e)))?;

    let output = child
        .wait_with_output()
        .map_err(|e| GatewayError::Transcode(format!("codec did not finish: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GatewayError::Transcode(format!(
            "codec exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    if output.stdout.is_empty() {
        return Err(GatewayError::Transcode("codec produced no output".into()));
    }

    Ok(output.stdout)
}
