//! HTTP endpoints
//!
//! REST surface for admission and discovery, plus the streaming upgrade.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Json, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tts_gateway_core::{AudioFormat, CreateSessionRequest, GatewayError};

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::wav::pcm16_to_wav;
use crate::ws::stream_handler;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.config.server.cors_origins,
        state.config.server.cors_enabled,
    );

    Router::new()
        // Admission and introspection
        .route("/v1/tts/sessions", post(create_session))
        .route("/v1/tts/sessions/:id", get(get_session))
        .route("/v1/tts/sessions/:id/audio", get(get_session_audio))
        // Discovery
        .route("/v1/voices", get(list_voices))
        // Streaming
        .route("/v1/tts/stream/:session_id", get(stream_handler))
        // Health and metrics
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Gateway error with its HTTP mapping.
struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            GatewayError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            GatewayError::UnknownProvider(_) => (StatusCode::NOT_FOUND, "unknown_provider"),
            GatewayError::UnknownVoice(_) => (StatusCode::NOT_FOUND, "unknown_voice"),
            GatewayError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
            GatewayError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            GatewayError::QueueFull | GatewayError::ShuttingDown | GatewayError::CircuitOpen(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "overloaded")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(serde_json::json!({
            "error": error,
            "message": self.0.to_string(),
        }));

        let mut response = (status, body).into_response();
        if let GatewayError::RateLimited { retry_after_s } = self.0 {
            if let Ok(value) = HeaderValue::from_str(&retry_after_s.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Session creation body. `target_format` is parsed explicitly so unknown
/// formats surface as a 400, not a deserialization rejection.
#[derive(Debug, Deserialize)]
struct ApiCreateSessionRequest {
    provider: String,
    voice: String,
    text: String,
    target_format: String,
    sample_rate_hz: u32,
    #[serde(default)]
    language: Option<String>,
}

/// `POST /v1/tts/sessions`
async fn create_session(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<ApiCreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target_format = AudioFormat::parse(&body.target_format).ok_or_else(|| {
        GatewayError::Validation(format!("unsupported target_format: {}", body.target_format))
    })?;

    let request = CreateSessionRequest {
        provider: body.provider,
        voice: body.voice,
        text: body.text,
        target_format,
        sample_rate_hz: body.sample_rate_hz,
        language: body.language,
    };

    // The peer address is the rate-limit origin key.
    let origin = addr.ip().to_string();
    let session = state.service.create_session(&origin, &request)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": session.id,
            "ws_url": format!("/v1/tts/stream/{}", session.id),
        })),
    ))
}

/// `GET /v1/tts/sessions/:id`
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .store()
        .get(&id)
        .ok_or(GatewayError::SessionNotFound(id))?;

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "provider": session.provider_id,
        "voice": session.voice_id,
        "status": session.status,
        "target_format": session.target_spec.format,
        "sample_rate_hz": session.target_spec.sample_rate_hz,
        "created_at": session.created_at,
        "started_at": session.started_at,
        "finished_at": session.finished_at,
        "failure_reason": session.failure_reason,
    })))
}

/// `GET /v1/tts/sessions/:id/audio`
///
/// Self-contained WAV of a completed session, available while the retention
/// policy keeps the audio around.
async fn get_session_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let audio = state
        .store()
        .audio(&id)
        .ok_or(GatewayError::SessionNotFound(id))?;

    let wav = pcm16_to_wav(&audio.pcm16, audio.sample_rate_hz)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CONTENT_DISPOSITION, "attachment"),
        ],
        wav,
    )
        .into_response())
}

/// `GET /v1/voices`
async fn list_voices(State(state): State<AppState>) -> Json<serde_json::Value> {
    let supported_formats: Vec<&str> = AudioFormat::SUPPORTED.iter().map(|f| f.as_str()).collect();

    let voices: Vec<serde_json::Value> = state
        .registry()
        .all_voices()
        .iter()
        .map(|v| {
            serde_json::json!({
                "id": v.id,
                "name": v.display_name,
                "language": v.language,
                "provider": v.provider_id,
                "sample_rate_hz": v.native_sample_rate_hz,
                "supported_formats": supported_formats,
            })
        })
        .collect();

    Json(serde_json::json!({ "voices": voices }))
}

/// `GET /healthz`
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use tts_gateway_config::{Settings, TranscoderConfig};
    use tts_gateway_pipeline::{
        CircuitBreaker, FixedWindowLimiter, SessionStore, StreamingQueue, TtsService,
    };
    use tts_gateway_providers::build_registry;
    use tts_gateway_transcode::GatewayTranscoder;

    use crate::state::WorkerHandles;

    fn test_state() -> AppState {
        let settings = Settings::default();
        let registry = Arc::new(build_registry(&settings.providers).unwrap());
        let store = Arc::new(SessionStore::new(settings.retention.clone()));
        let service = Arc::new(TtsService::new(
            registry,
            store,
            CircuitBreaker::new(settings.breaker.clone()),
            Arc::new(GatewayTranscoder::new(TranscoderConfig::default())),
            Arc::new(FixedWindowLimiter::new(&settings.rate_limit)),
            settings.pipeline.clone(),
            settings.validation.clone(),
            settings.retention.keep_audio,
        ));
        let (queue, _receiver) = StreamingQueue::bounded(settings.queue.maxsize);

        AppState::new(
            Arc::new(settings),
            service,
            queue,
            WorkerHandles {
                busy: Arc::new(AtomicUsize::new(0)),
                total: 0,
            },
        )
    }

    #[test]
    fn test_router_creation() {
        let _ = create_router(test_state());
    }

    #[tokio::test]
    async fn test_list_voices_shape() {
        let Json(body) = list_voices(State(test_state())).await;
        let voices = body["voices"].as_array().unwrap();
        assert!(!voices.is_empty());
        assert!(voices[0]["supported_formats"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f == "pcm16"));
    }
}
