//! Per-IP rate limiting for authentication failures (spec §7): sources that
//! exceed a per-IP threshold of `InvalidSignature`/`InvalidPassword`/replay
//! rejections get throttled rather than allowed to retry unboundedly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tracks auth-failure timestamps per source IP. Allows at most
/// `max_failures` within `window`; periodically prunes expired/idle keys so
/// an attacker cycling through addresses can't grow this unboundedly.
pub struct AuthFailureLimiter {
    failures: Mutex<HashMap<String, Vec<Instant>>>,
    max_failures: usize,
    window: Duration,
    max_keys: usize,
    call_count: AtomicU64,
    ttl_cleanup_interval: u64,
}

impl AuthFailureLimiter {
    pub fn new(max_failures: usize, window_secs: u64) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            max_failures,
            window: Duration::from_secs(window_secs),
            max_keys: 10_000,
            call_count: AtomicU64::new(0),
            ttl_cleanup_interval: 100,
        }
    }

    /// Returns `true` if `source_ip` is still under its failure budget.
    pub fn is_allowed(&self, source_ip: &str) -> bool {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        let count = self.call_count.fetch_add(1, Ordering::Relaxed);
        if count.is_multiple_of(self.ttl_cleanup_interval) || failures.len() > self.max_keys / 2 {
            failures.retain(|_k, timestamps| {
                timestamps.retain(|t| now.duration_since(*t) < self.window);
                !timestamps.is_empty()
            });
        }

        if failures.len() >= self.max_keys && !failures.contains_key(source_ip) {
            return false;
        }

        let entry = failures.entry(source_ip.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        entry.len() < self.max_failures
    }

    /// Records one more auth failure from `source_ip`. Call after
    /// `is_allowed` returned `true` and the request then failed auth.
    pub fn record_failure(&self, source_ip: &str) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.entry(source_ip.to_string()).or_default().push(Instant::now());
    }

    /// Clears a source's failure history, e.g. after it authenticates successfully.
    pub fn clear(&self, source_ip: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(source_ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_failures() {
        let limiter = AuthFailureLimiter::new(3, 60);
        for _ in 0..3 {
            assert!(limiter.is_allowed("1.2.3.4"));
            limiter.record_failure("1.2.3.4");
        }
        assert!(!limiter.is_allowed("1.2.3.4"));
    }

    #[test]
    fn tracks_sources_independently() {
        let limiter = AuthFailureLimiter::new(1, 60);
        assert!(limiter.is_allowed("1.1.1.1"));
        limiter.record_failure("1.1.1.1");
        assert!(!limiter.is_allowed("1.1.1.1"));
        assert!(limiter.is_allowed("2.2.2.2"));
    }

    #[test]
    fn clear_resets_a_sources_history() {
        let limiter = AuthFailureLimiter::new(1, 60);
        limiter.record_failure("1.1.1.1");
        assert!(!limiter.is_allowed("1.1.1.1"));
        limiter.clear("1.1.1.1");
        assert!(limiter.is_allowed("1.1.1.1"));
    }
}
