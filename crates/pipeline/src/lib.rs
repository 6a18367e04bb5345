//! Streaming pipeline, worker pool, and overload controls
//!
//! This crate owns everything between admission and the framed transport:
//! - `FixedWindowLimiter` - per-origin admission gate
//! - `CircuitBreaker` - per-provider failure tracker
//! - `SessionStore` - in-memory session records with the monotonic
//!   transition graph and a bounded retention policy
//! - `StreamingQueue` / `WorkerPool` - bounded FIFO of streaming jobs and
//!   the fixed pool that drains it
//! - `TtsService` - session admission and the per-session pipeline driver

pub mod breaker;
pub mod queue;
pub mod rate_limit;
pub mod service;
pub mod store;

pub use breaker::{BreakerLease, BreakerSnapshot, CircuitBreaker};
pub use queue::{EnqueueError, SessionWorkItem, StreamingQueue, WorkerPool};
pub use rate_limit::{Admission, FixedWindowLimiter};
pub use service::TtsService;
pub use store::SessionStore;
