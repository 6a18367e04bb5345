//! Per-origin fixed-window admission rate limiting

use std::time::{Duration, Instant};

use dashmap::DashMap;

use tts_gateway_config::RateLimitConfig;

/// Outcome of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after_s: u64 },
}

#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Fixed-window counter per origin key.
///
/// Concurrent `admit` calls for the same key are linearized by the map's
/// per-entry locking. Memory stays bounded by the set of origins active in
/// the last window: expired buckets are reset in place on admit and swept
/// during the observable scans.
pub struct FixedWindowLimiter {
    window: Duration,
    quota: u32,
    buckets: DashMap<String, Bucket>,
}

impl FixedWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_seconds),
            quota: config.max_requests_per_window,
            buckets: DashMap::new(),
        }
    }

    /// Admit or deny one request from `key`.
    pub fn admit(&self, key: &str) -> Admission {
        let now = Instant::now();
        let mut entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket {
                window_start: now,
                count: 0,
            });

        if now.duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count < self.quota {
            entry.count += 1;
            Admission::Allowed
        } else {
            let elapsed = now.duration_since(entry.window_start);
            let remaining = self.window.saturating_sub(elapsed);
            metrics::counter!("rate_limited_total").increment(1);
            Admission::Denied {
                retry_after_s: remaining.as_secs().max(1),
            }
        }
    }

    /// Highest bucket usage across active keys, as a fraction in [0, 1].
    /// Also evicts expired empty buckets.
    pub fn max_bucket_usage(&self) -> f64 {
        self.sweep_expired();
        self.buckets
            .iter()
            .map(|b| b.count as f64 / self.quota as f64)
            .fold(0.0, f64::max)
            .min(1.0)
    }

    /// Smallest window-remaining time over active keys. Full window when no
    /// key is active.
    pub fn min_window_remaining(&self) -> Duration {
        let now = Instant::now();
        self.buckets
            .iter()
            .map(|b| {
                self.window
                    .saturating_sub(now.duration_since(b.window_start))
            })
            .min()
            .unwrap_or(self.window)
    }

    fn sweep_expired(&self) {
        let now = Instant::now();
        let window = self.window;
        // An expired window means the key is no longer active; dropping the
        // bucket keeps memory bounded by the last window's origins.
        self.buckets
            .retain(|_, b| now.duration_since(b.window_start) < window);
    }

    pub fn active_keys(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(quota: u32, window_seconds: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::new(&RateLimitConfig {
            max_requests_per_window: quota,
            window_seconds,
        })
    }

    #[test]
    fn test_quota_enforced() {
        let limiter = limiter(2, 60);

        assert_eq!(limiter.admit("1.2.3.4"), Admission::Allowed);
        assert_eq!(limiter.admit("1.2.3.4"), Admission::Allowed);
        match limiter.admit("1.2.3.4") {
            Admission::Denied { retry_after_s } => assert!(retry_after_s <= 60),
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1, 60);

        assert_eq!(limiter.admit("a"), Admission::Allowed);
        assert_eq!(limiter.admit("b"), Admission::Allowed);
        assert!(matches!(limiter.admit("a"), Admission::Denied { .. }));
    }

    #[test]
    fn test_window_reset() {
        let limiter = limiter(1, 1);

        assert_eq!(limiter.admit("a"), Admission::Allowed);
        assert!(matches!(limiter.admit("a"), Admission::Denied { .. }));

        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(limiter.admit("a"), Admission::Allowed);
    }

    #[test]
    fn test_usage_observable() {
        let limiter = limiter(4, 60);
        assert_eq!(limiter.max_bucket_usage(), 0.0);

        limiter.admit("a");
        limiter.admit("a");
        limiter.admit("b");
        assert!((limiter.max_bucket_usage() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_window_remaining_observable() {
        let limiter = limiter(4, 60);
        assert_eq!(limiter.min_window_remaining(), Duration::from_secs(60));

        limiter.admit("a");
        assert!(limiter.min_window_remaining() <= Duration::from_secs(60));
    }

    #[test]
    fn test_expired_buckets_evicted() {
        let limiter = limiter(4, 1);
        limiter.admit("a");
        limiter.admit("b");
        assert_eq!(limiter.active_keys(), 2);

        std::thread::sleep(Duration::from_millis(1100));
        limiter.max_bucket_usage(); // triggers the sweep
        assert_eq!(limiter.active_keys(), 0);
    }

    #[test]
    fn test_concurrent_admissions_bounded_by_quota() {
        use std::sync::Arc;

        let limiter = Arc::new(limiter(5, 60));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                matches!(limiter.admit("origin"), Admission::Allowed)
            }));
        }

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(allowed, 5);
    }
}
