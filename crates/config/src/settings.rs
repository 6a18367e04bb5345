//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// HTTP/WebSocket server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-origin admission rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Streaming queue and worker pool sizing
    #[serde(default)]
    pub queue: QueueConfig,

    /// Per-session pipeline timing and retry policy
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Per-provider circuit breaker parameters
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Synthesis provider enablement and endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Transcoder configuration
    #[serde(default)]
    pub transcoder: TranscoderConfig,

    /// Retention of terminal sessions (and their audio) in memory
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Request validation policy
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings, rejecting values the gateway cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "port cannot be 0"));
        }

        if self.rate_limit.max_requests_per_window == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.max_requests_per_window",
                "quota must be at least 1",
            ));
        }
        if self.rate_limit.window_seconds == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.window_seconds",
                "window must be at least 1 second",
            ));
        }

        if self.queue.maxsize == 0 {
            return Err(ConfigError::invalid(
                "queue.maxsize",
                "queue capacity must be at least 1",
            ));
        }
        if self.queue.worker_count == 0 {
            return Err(ConfigError::invalid(
                "queue.worker_count",
                "worker pool must have at least 1 worker",
            ));
        }

        if self.pipeline.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "pipeline.max_attempts",
                "must allow at least 1 attempt",
            ));
        }
        if self.pipeline.chunk_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "pipeline.chunk_timeout_ms",
                "per-chunk timeout must be positive",
            ));
        }

        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "breaker.failure_threshold",
                "must be at least 1",
            ));
        }
        if self.breaker.half_open_max_trials == 0 {
            return Err(ConfigError::invalid(
                "breaker.half_open_max_trials",
                "must allow at least 1 trial",
            ));
        }

        if self.providers.http.enabled && self.providers.http.endpoint.is_empty() {
            return Err(ConfigError::invalid(
                "providers.http.endpoint",
                "endpoint is required when the http provider is enabled",
            ));
        }

        if !self.providers.mock_tone.enabled && !self.providers.http.enabled {
            tracing::warn!("No synthesis provider is enabled; all sessions will be rejected");
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS origin checks (false = permissive, dev only)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
        }
    }
}

/// Fixed-window admission rate limiting, keyed by client origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Per-origin quota within one window
    #[serde(default = "default_rate_limit_quota")]
    pub max_requests_per_window: u32,

    /// Window length in seconds
    #[serde(default = "default_rate_limit_window")]
    pub window_seconds: u64,
}

fn default_rate_limit_quota() -> u32 {
    env_or("RATE_LIMIT_MAX_REQUESTS_PER_WINDOW", 50)
}

fn default_rate_limit_window() -> u64 {
    env_or("RATE_LIMIT_WINDOW_SECONDS", 60)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: default_rate_limit_quota(),
            window_seconds: default_rate_limit_window(),
        }
    }
}

/// Streaming queue and worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Bounded queue capacity; enqueue past this rejects immediately
    #[serde(default = "default_queue_maxsize")]
    pub maxsize: usize,

    /// Number of streaming workers started at boot
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_queue_maxsize() -> usize {
    env_or("SESSION_QUEUE_MAXSIZE", 100)
}

fn default_worker_count() -> usize {
    env_or("SESSION_QUEUE_WORKER_COUNT", 8)
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            maxsize: default_queue_maxsize(),
            worker_count: default_worker_count(),
        }
    }
}

/// Per-session pipeline timing and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Wall time budget for each "pull next chunk" operation
    #[serde(default = "default_chunk_timeout_ms")]
    pub chunk_timeout_ms: u64,

    /// Total provider attempts before the first audio frame is delivered
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff between attempts; doubles each retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Optional whole-session soft deadline in seconds
    #[serde(default)]
    pub session_deadline_seconds: Option<u64>,
}

fn default_chunk_timeout_ms() -> u64 {
    5000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    100
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_timeout_ms: default_chunk_timeout_ms(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            session_deadline_seconds: None,
        }
    }
}

/// Per-provider circuit breaker parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before probing
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_seconds: u64,

    /// Concurrent trials allowed while half-open; the same number of
    /// consecutive successes closes the breaker
    #[serde(default = "default_half_open_trials")]
    pub half_open_max_trials: u32,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_reset_timeout() -> u64 {
    30
}
fn default_half_open_trials() -> u32 {
    2
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_seconds: default_reset_timeout(),
            half_open_max_trials: default_half_open_trials(),
        }
    }
}

/// Synthesis provider enablement and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub mock_tone: MockToneConfig,

    #[serde(default)]
    pub http: HttpProviderConfig,
}

/// Mock tone provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockToneConfig {
    #[serde(default = "default_mock_enabled")]
    pub enabled: bool,

    /// Milliseconds of synthesized audio per input character
    #[serde(default = "default_ms_per_char")]
    pub ms_per_char: u64,

    /// Chunk duration in milliseconds
    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u64,
}

fn default_mock_enabled() -> bool {
    env_flag("PROVIDER_MOCK_TONE_ENABLED", true)
}
fn default_ms_per_char() -> u64 {
    60
}
fn default_chunk_ms() -> u64 {
    40
}

impl Default for MockToneConfig {
    fn default() -> Self {
        Self {
            enabled: default_mock_enabled(),
            ms_per_char: default_ms_per_char(),
            chunk_ms: default_chunk_ms(),
        }
    }
}

/// External synthesis HTTP API adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,

    /// Synthesis endpoint URL
    #[serde(default = "default_http_endpoint")]
    pub endpoint: String,

    /// Bearer token, if the upstream requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model/engine tag forwarded upstream
    #[serde(default = "default_http_model")]
    pub model: String,

    /// Languages the upstream accepts
    #[serde(default = "default_http_languages")]
    pub languages: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,

    /// Chunk size (bytes of PCM16) the adapter slices responses into
    #[serde(default = "default_http_chunk_bytes")]
    pub chunk_bytes: usize,
}

fn default_http_enabled() -> bool {
    env_flag("PROVIDER_HTTP_ENABLED", false)
}
fn default_http_endpoint() -> String {
    std::env::var("PROVIDER_HTTP_ENDPOINT").unwrap_or_default()
}
fn default_http_model() -> String {
    std::env::var("PROVIDER_HTTP_MODEL").unwrap_or_else(|_| "standard-v1".to_string())
}
fn default_http_languages() -> Vec<String> {
    std::env::var("PROVIDER_HTTP_LANGUAGES")
        .map(|s| s.split(',').map(|l| l.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["en-US".to_string()])
}
fn default_http_timeout() -> u64 {
    30
}
fn default_http_chunk_bytes() -> usize {
    3200 // 100ms of 16kHz PCM16
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            endpoint: default_http_endpoint(),
            api_key: None,
            model: default_http_model(),
            languages: default_http_languages(),
            timeout_seconds: default_http_timeout(),
            chunk_bytes: default_http_chunk_bytes(),
        }
    }
}

/// Transcoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to the external codec binary used for mp3/opus targets
    #[serde(default = "default_codec_binary")]
    pub codec_binary: String,
}

fn default_codec_binary() -> String {
    std::env::var("TRANSCODER_CODEC_BINARY").unwrap_or_else(|_| "ffmpeg".to_string())
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            codec_binary: default_codec_binary(),
        }
    }
}

/// Retention of terminal session records (and optionally their audio).
///
/// Sessions live only in memory; this bounds how long and how many terminal
/// records stay around for introspection and the completed-audio route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Seconds a terminal session record is retained
    #[serde(default = "default_terminal_ttl")]
    pub terminal_ttl_seconds: u64,

    /// Cap on retained terminal sessions; oldest-finished evicted first
    #[serde(default = "default_max_terminal")]
    pub max_terminal_sessions: usize,

    /// Retain decoded audio of completed sessions for the file route
    #[serde(default = "default_true")]
    pub keep_audio: bool,

    /// Cleanup sweep interval in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_terminal_ttl() -> u64 {
    600
}
fn default_max_terminal() -> usize {
    1024
}
fn default_cleanup_interval() -> u64 {
    60
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            terminal_ttl_seconds: default_terminal_ttl(),
            max_terminal_sessions: default_max_terminal(),
            keep_audio: default_true(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Request validation policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationConfig {
    /// Require that the requested voice belongs to the requested provider.
    /// Catalog existence is always required; ownership is opt-in.
    #[serde(default)]
    pub enforce_voice_ownership: bool,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn env_flag(key: &str, fallback: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(fallback)
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. `TTS_GATEWAY__` environment variables and the flat keys read in the
///    serde default functions above
/// 2. `config/{env}.yaml` (if an environment name is given)
/// 3. `config/default.yaml`
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("TTS_GATEWAY")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.rate_limit.max_requests_per_window, 50);
        assert_eq!(settings.rate_limit.window_seconds, 60);
        assert_eq!(settings.queue.maxsize, 100);
        assert_eq!(settings.queue.worker_count, 8);
        assert!(settings.providers.mock_tone.enabled);
        assert!(!settings.providers.http.enabled);
    }

    #[test]
    fn test_defaults_pass_validation() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_quota_rejected() {
        let mut settings = Settings::default();
        settings.rate_limit.max_requests_per_window = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut settings = Settings::default();
        settings.queue.worker_count = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_http_provider_requires_endpoint() {
        let mut settings = Settings::default();
        settings.providers.http.enabled = true;
        settings.providers.http.endpoint = String::new();
        assert!(settings.validate().is_err());

        settings.providers.http.endpoint = "http://tts.internal/v1/synthesize".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_breaker_bounds() {
        let mut settings = Settings::default();
        settings.breaker.failure_threshold = 0;
        assert!(settings.validate().is_err());

        settings.breaker.failure_threshold = 3;
        settings.breaker.half_open_max_trials = 0;
        assert!(settings.validate().is_err());
    }
}
