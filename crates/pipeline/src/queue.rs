//! Streaming queue and worker pool
//!
//! A process-wide bounded FIFO of streaming jobs and a fixed pool of
//! workers, started at boot, that drains it. Enqueue is non-blocking: a
//! full queue rejects immediately and the transport handler reports the
//! rejection to the client.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use tts_gateway_core::FrameTransport;

use crate::service::TtsService;

/// One queued streaming job: the session id and the client's transport.
/// Consumed exactly once by the worker that dequeues it.
pub struct SessionWorkItem {
    pub session_id: String,
    pub transport: Box<dyn FrameTransport>,
}

/// Rejected enqueue, handing the item back so the transport handler can
/// report the rejection to the client.
pub enum EnqueueError {
    /// Queue at capacity
    Full(SessionWorkItem),
    /// Worker pool is shutting down
    Closed(SessionWorkItem),
}

impl std::fmt::Debug for EnqueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueError::Full(item) => f
                .debug_tuple("Full")
                .field(&item.session_id)
                .finish(),
            EnqueueError::Closed(item) => f
                .debug_tuple("Closed")
                .field(&item.session_id)
                .finish(),
        }
    }
}

/// Sender half of the bounded streaming queue.
#[derive(Clone)]
pub struct StreamingQueue {
    tx: mpsc::Sender<SessionWorkItem>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
    rejected_total: Arc<AtomicU64>,
}

/// Receiver half, handed to the worker pool.
pub struct QueueReceiver {
    rx: mpsc::Receiver<SessionWorkItem>,
    depth: Arc<AtomicUsize>,
}

impl StreamingQueue {
    /// Create the bounded queue with its receiver half.
    pub fn bounded(capacity: usize) -> (StreamingQueue, QueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let depth = Arc::new(AtomicUsize::new(0));
        (
            StreamingQueue {
                tx,
                depth: Arc::clone(&depth),
                capacity,
                rejected_total: Arc::new(AtomicU64::new(0)),
            },
            QueueReceiver { rx, depth },
        )
    }

    /// Non-blocking enqueue. Rejects immediately when the queue is at
    /// capacity; the caller reports the rejection to the client.
    pub fn enqueue(&self, item: SessionWorkItem) -> Result<(), EnqueueError> {
        match self.tx.try_send(item) {
            Ok(()) => {
                let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::gauge!("queue_depth").set(depth as f64);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(item)) => {
                self.rejected_total.fetch_add(1, Ordering::SeqCst);
                metrics::counter!("queue_full_total").increment(1);
                tracing::warn!(capacity = self.capacity, "Streaming queue full, rejecting");
                Err(EnqueueError::Full(item))
            }
            Err(mpsc::error::TrySendError::Closed(item)) => Err(EnqueueError::Closed(item)),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected_total.load(Ordering::SeqCst)
    }
}

/// Fixed-size pool of streaming workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    busy: Arc<AtomicUsize>,
    total: usize,
}

impl WorkerPool {
    /// Start `worker_count` workers draining the queue.
    pub fn start(
        service: Arc<TtsService>,
        receiver: QueueReceiver,
        worker_count: usize,
    ) -> WorkerPool {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let busy = Arc::new(AtomicUsize::new(0));
        let rx = Arc::new(Mutex::new(receiver.rx));
        let depth = receiver.depth;

        metrics::gauge!("workers_total").set(worker_count as f64);

        let handles = (0..worker_count)
            .map(|worker_id| {
                let service = Arc::clone(&service);
                let rx = Arc::clone(&rx);
                let depth = Arc::clone(&depth);
                let busy = Arc::clone(&busy);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, service, rx, depth, busy, shutdown_rx).await;
                })
            })
            .collect();

        WorkerPool {
            handles,
            shutdown_tx,
            busy,
            total: worker_count,
        }
    }

    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    /// Shared busy counter, for observability surfaces that outlive the
    /// pool borrow.
    pub fn busy_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.busy)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Stop dequeueing and wait for in-flight sessions to reach a terminal
    /// state. In-flight pipelines observe the shutdown signal at their next
    /// chunk boundary.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        tracing::info!("Worker pool drained");
    }
}

async fn worker_loop(
    worker_id: usize,
    service: Arc<TtsService>,
    rx: Arc<Mutex<mpsc::Receiver<SessionWorkItem>>>,
    depth: Arc<AtomicUsize>,
    busy: Arc<AtomicUsize>,
    shutdown_rx: watch::Receiver<bool>,
) {
    tracing::debug!(worker_id, "Streaming worker started");
    let mut shutdown = shutdown_rx.clone();

    loop {
        let item = {
            let mut rx = rx.lock().await;
            tokio::select! {
                item = rx.recv() => item,
                _ = shutdown.changed() => None,
            }
        };

        let Some(item) = item else { break };

        let new_depth = depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::gauge!("queue_depth").set(new_depth as f64);

        let now_busy = busy.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("workers_busy").set(now_busy as f64);
        metrics::gauge!("active_streams").set(now_busy as f64);

        tracing::debug!(worker_id, session_id = %item.session_id, "Worker picked up session");
        service
            .stream(&item.session_id, item.transport, shutdown_rx.clone())
            .await;

        let now_busy = busy.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::gauge!("workers_busy").set(now_busy as f64);
        metrics::gauge!("active_streams").set(now_busy as f64);
    }

    tracing::debug!(worker_id, "Streaming worker stopped");
}
