//! TTS gateway entry point

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use tts_gateway_config::{load_settings, Settings};
use tts_gateway_pipeline::{
    CircuitBreaker, FixedWindowLimiter, SessionStore, StreamingQueue, TtsService, WorkerPool,
};
use tts_gateway_providers::build_registry;
use tts_gateway_server::{create_router, init_metrics, AppState};
use tts_gateway_server::state::WorkerHandles;
use tts_gateway_transcode::GatewayTranscoder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from files and environment.
    let env = std::env::var("TTS_GATEWAY_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized, use eprintln for early logging.
            eprintln!("Warning: failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting TTS gateway v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_env = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    let _metrics_handle = init_metrics();
    tracing::info!("Initialized Prometheus metrics at /metrics");

    // Components are injected top-down; ownership is a DAG with no cycles.
    let registry = Arc::new(build_registry(&config.providers)?);
    let store = Arc::new(SessionStore::new(config.retention.clone()));
    let cleanup_shutdown = store.start_cleanup_task();

    let limiter = Arc::new(FixedWindowLimiter::new(&config.rate_limit));
    let breaker = CircuitBreaker::new(config.breaker.clone());
    let transcoder = Arc::new(GatewayTranscoder::new(config.transcoder.clone()));

    let service = Arc::new(TtsService::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        breaker,
        transcoder,
        limiter,
        config.pipeline.clone(),
        config.validation.clone(),
        config.retention.keep_audio,
    ));

    let (queue, receiver) = StreamingQueue::bounded(config.queue.maxsize);
    let pool = WorkerPool::start(Arc::clone(&service), receiver, config.queue.worker_count);
    tracing::info!(
        workers = pool.total(),
        queue_capacity = queue.capacity(),
        "Worker pool started"
    );

    let workers = WorkerHandles {
        busy: pool.busy_handle(),
        total: pool.total(),
    };

    let host: IpAddr = config.server.host.parse().unwrap_or_else(|_| {
        tracing::warn!(host = %config.server.host, "Invalid bind host, using 0.0.0.0");
        IpAddr::from([0, 0, 0, 0])
    });
    let addr = SocketAddr::new(host, config.server.port);

    let state = AppState::new(Arc::new(config), service, queue, workers);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Stop dequeueing and drive in-flight sessions to a terminal state.
    pool.shutdown().await;
    let _ = cleanup_shutdown.send(true);

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Initialize tracing with env-filter and optional JSON output.
fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("tts_gateway={},tower_http=info", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
