//! Prometheus metrics
//!
//! Counters are incremented at their point of origin throughout the
//! pipeline crates; sampled gauges (rate-limit usage, queue depth, worker
//! occupancy) are refreshed when the metrics endpoint is scraped.

use axum::extract::State;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::state::AppState;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and describe the gateway's metrics.
/// Idempotent; returns the render handle.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            metrics::describe_counter!(
                "sessions_created_total",
                "Sessions admitted and persisted"
            );
            metrics::describe_counter!(
                "sessions_completed_total",
                "Sessions that delivered all audio and eos"
            );
            metrics::describe_counter!(
                "sessions_failed_total",
                "Sessions that ended with a terminal error frame"
            );
            metrics::describe_counter!(
                "sessions_cancelled_total",
                "Sessions cancelled by client disconnect"
            );
            metrics::describe_counter!(
                "audio_frames_sent_total",
                "Audio frames delivered to transports"
            );
            metrics::describe_counter!("queue_full_total", "Enqueue rejections due to a full queue");
            metrics::describe_counter!("rate_limited_total", "Admissions denied by the rate limiter");
            metrics::describe_counter!("breaker_opened_total", "Circuit breaker open transitions");

            metrics::describe_gauge!("active_streams", "Sessions currently streaming");
            metrics::describe_gauge!("queue_depth", "Work items waiting in the streaming queue");
            metrics::describe_gauge!("queue_maxsize", "Streaming queue capacity");
            metrics::describe_gauge!("workers_busy", "Workers currently driving a pipeline");
            metrics::describe_gauge!("workers_total", "Workers in the pool");
            metrics::describe_gauge!(
                "rate_limit_max_bucket_usage",
                "Highest per-origin window usage, 0..1"
            );
            metrics::describe_gauge!(
                "rate_limit_window_remaining_seconds",
                "Smallest window-remaining time over active origins"
            );
            metrics::describe_gauge!("sessions_in_store", "Session records currently retained");

            handle
        })
        .clone()
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> String {
    refresh_sampled_gauges(&state);

    match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}

fn refresh_sampled_gauges(state: &AppState) {
    let limiter = state.service.limiter();
    metrics::gauge!("rate_limit_max_bucket_usage").set(limiter.max_bucket_usage());
    metrics::gauge!("rate_limit_window_remaining_seconds")
        .set(limiter.min_window_remaining().as_secs_f64());

    metrics::gauge!("queue_depth").set(state.queue.depth() as f64);
    metrics::gauge!("queue_maxsize").set(state.queue.capacity() as f64);

    let busy = state
        .workers
        .busy
        .load(std::sync::atomic::Ordering::SeqCst) as f64;
    metrics::gauge!("workers_busy").set(busy);
    metrics::gauge!("active_streams").set(busy);
    metrics::gauge!("workers_total").set(state.workers.total as f64);

    metrics::gauge!("sessions_in_store").set(state.store().count() as f64);
}
