//! Voice catalog entries

use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;

/// Immutable catalog entry describing one synthesizable voice.
///
/// Catalogs are loaded at startup and live for the whole process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub display_name: String,
    pub language: String,
    pub native_sample_rate_hz: u32,
    pub base_format: AudioFormat,
    /// Provider that owns this voice
    pub provider_id: String,
}

impl Voice {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        language: impl Into<String>,
        native_sample_rate_hz: u32,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            language: language.into(),
            native_sample_rate_hz,
            base_format: AudioFormat::Pcm16,
            provider_id: provider_id.into(),
        }
    }
}
