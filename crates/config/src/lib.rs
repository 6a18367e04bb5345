//! Layered configuration for the TTS streaming gateway
//!
//! Priority (highest to lowest):
//! 1. Flat environment keys (`RATE_LIMIT_MAX_REQUESTS_PER_WINDOW`, ...)
//!    and `TTS_GATEWAY__`-prefixed environment variables
//! 2. `config/{env}.yaml` (if an environment name is given)
//! 3. `config/default.yaml`
//! 4. Built-in defaults

mod settings;

pub use settings::{
    load_settings, BreakerConfig, HttpProviderConfig, MockToneConfig, ObservabilityConfig,
    PipelineConfig, ProvidersConfig, QueueConfig, RateLimitConfig, RetentionConfig,
    RuntimeEnvironment, ServerConfig, Settings, TranscoderConfig, ValidationConfig,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
