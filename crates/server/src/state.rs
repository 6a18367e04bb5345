//! Application state
//!
//! Shared, cheaply-cloneable handles injected into every handler. All
//! components are constructed at startup and torn down through explicit
//! shutdown hooks; nothing here is process-global.

use std::sync::Arc;

use tts_gateway_config::Settings;
use tts_gateway_pipeline::{SessionStore, StreamingQueue, TtsService};
use tts_gateway_providers::ProviderRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub service: Arc<TtsService>,
    pub queue: StreamingQueue,
    /// Worker pool gauges, sampled by the metrics endpoint
    pub workers: WorkerHandles,
}

/// Observable handles into the worker pool.
#[derive(Clone)]
pub struct WorkerHandles {
    pub busy: Arc<std::sync::atomic::AtomicUsize>,
    pub total: usize,
}

impl AppState {
    pub fn new(
        config: Arc<Settings>,
        service: Arc<TtsService>,
        queue: StreamingQueue,
        workers: WorkerHandles,
    ) -> Self {
        Self {
            config,
            service,
            queue,
            workers,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.service.store()
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.service.registry()
    }
}
