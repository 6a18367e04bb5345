//! Per-provider circuit breaker
//!
//! Three-state machine (Closed / Open / HalfOpen) consulted before any
//! synthesis attempt. A permit yields a single-use lease; the holder records
//! success or failure exactly once, or drops the lease to abandon the trial
//! (client cancellation is not a provider fault).

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use tts_gateway_config::BreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { in_flight: u32, successes: u32 },
}

/// Read-only view of a provider's breaker state, for metrics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerSnapshot {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    config: BreakerConfig,
    states: DashMap<String, State>,
}

/// Per-provider failure tracker gating new synthesis attempts.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                states: DashMap::new(),
            }),
        }
    }

    /// Try to acquire a lease for one synthesis attempt.
    ///
    /// Returns `None` while the breaker denies the provider.
    pub fn permit(&self, provider_id: &str) -> Option<BreakerLease> {
        let reset_timeout = Duration::from_secs(self.inner.config.reset_timeout_seconds);
        let max_trials = self.inner.config.half_open_max_trials;

        let mut entry = self
            .inner
            .states
            .entry(provider_id.to_string())
            .or_insert(State::Closed { failures: 0 });

        let granted = match *entry {
            State::Closed { .. } => true,
            State::Open { since } => {
                if since.elapsed() >= reset_timeout {
                    tracing::info!(provider = provider_id, "Circuit breaker half-open, probing");
                    *entry = State::HalfOpen {
                        in_flight: 1,
                        successes: 0,
                    };
                    true
                } else {
                    false
                }
            }
            State::HalfOpen {
                ref mut in_flight, ..
            } => {
                if *in_flight < max_trials {
                    *in_flight += 1;
                    true
                } else {
                    false
                }
            }
        };
        drop(entry);

        granted.then(|| BreakerLease {
            breaker: self.clone(),
            provider_id: provider_id.to_string(),
            settled: false,
        })
    }

    /// Current state of a provider's breaker.
    pub fn snapshot(&self, provider_id: &str) -> BreakerSnapshot {
        match self.inner.states.get(provider_id).map(|s| *s) {
            None | Some(State::Closed { .. }) => BreakerSnapshot::Closed,
            Some(State::Open { .. }) => BreakerSnapshot::Open,
            Some(State::HalfOpen { .. }) => BreakerSnapshot::HalfOpen,
        }
    }

    fn record_success(&self, provider_id: &str) {
        let max_trials = self.inner.config.half_open_max_trials;
        if let Some(mut entry) = self.inner.states.get_mut(provider_id) {
            match *entry {
                State::Closed { .. } => *entry = State::Closed { failures: 0 },
                State::HalfOpen {
                    in_flight,
                    successes,
                } => {
                    let successes = successes + 1;
                    if successes >= max_trials {
                        tracing::info!(provider = provider_id, "Circuit breaker closed");
                        *entry = State::Closed { failures: 0 };
                    } else {
                        *entry = State::HalfOpen {
                            in_flight: in_flight.saturating_sub(1),
                            successes,
                        };
                    }
                }
                // A concurrent trial already re-opened the breaker.
                State::Open { .. } => {}
            }
        }
    }

    fn record_failure(&self, provider_id: &str) {
        let threshold = self.inner.config.failure_threshold;
        let mut entry = self
            .inner
            .states
            .entry(provider_id.to_string())
            .or_insert(State::Closed { failures: 0 });

        match *entry {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= threshold {
                    tracing::warn!(provider = provider_id, failures, "Circuit breaker opened");
                    metrics::counter!("breaker_opened_total").increment(1);
                    *entry = State::Open {
                        since: Instant::now(),
                    };
                } else {
                    *entry = State::Closed { failures };
                }
            }
            State::HalfOpen { .. } => {
                tracing::warn!(provider = provider_id, "Half-open trial failed, re-opening");
                metrics::counter!("breaker_opened_total").increment(1);
                *entry = State::Open {
                    since: Instant::now(),
                };
            }
            State::Open { .. } => {
                *entry = State::Open {
                    since: Instant::now(),
                };
            }
        }
    }

    fn abandon(&self, provider_id: &str) {
        if let Some(mut entry) = self.inner.states.get_mut(provider_id) {
            if let State::HalfOpen {
                in_flight,
                successes,
            } = *entry
            {
                *entry = State::HalfOpen {
                    in_flight: in_flight.saturating_sub(1),
                    successes,
                };
            }
        }
    }
}

/// Single-use token for one permitted synthesis attempt.
///
/// Consumed by `record_success` / `record_failure`; dropping it unrecorded
/// releases the half-open trial slot without moving any counter.
pub struct BreakerLease {
    breaker: CircuitBreaker,
    provider_id: String,
    settled: bool,
}

impl BreakerLease {
    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.record_success(&self.provider_id);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(&self.provider_id);
    }
}

impl Drop for BreakerLease {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.abandon(&self.provider_id);
        }
    }
}
