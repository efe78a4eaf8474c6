/// Sliding-window rate limiting for the search endpoints.
///
/// Request timestamps are kept in memory per `(action, client)` key, which
/// suits a single-instance deployment. The limiter is a process-wide object:
/// `init_rate_limits` installs the configured limits at startup.
use arc_swap::ArcSwap;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config;

/// Global rate limiter instance
pub static RATE_LIMITER: Lazy<Arc<RateLimiter>> = Lazy::new(|| Arc::new(RateLimiter::new()));

/// Active limits, swapped in by `init_rate_limits`
static RATE_LIMITS: Lazy<ArcSwap<RateLimits>> =
    Lazy::new(|| ArcSwap::from_pointee(RateLimits::default()));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
    pub search_max: usize,
    pub search_window: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::from_config(&app_config::RateLimitConfig::default())
    }
}

impl RateLimits {
    pub fn from_config(config: &app_config::RateLimitConfig) -> Self {
        Self {
            search_max: config.search_max_requests as usize,
            search_window: Duration::from_secs(config.search_window_seconds as u64),
        }
    }
}

/// Install limits from configuration (call at startup after loading settings)
pub fn init_rate_limits(config: &app_config::RateLimitConfig) {
    let limits = RateLimits::from_config(config);
    log::info!(
        "Search rate limit: {} requests per {}s",
        limits.search_max,
        limits.search_window.as_secs()
    );
    RATE_LIMITS.store(Arc::new(limits));
}

pub fn get_rate_limits() -> Arc<RateLimits> {
    RATE_LIMITS.load_full()
}

pub struct RateLimiter {
    /// `action:identifier` -> request timestamps
    requests: DashMap<String, Vec<Instant>>,
}

/// Error returned when rate limit is exceeded
#[derive(Debug, Clone)]
pub struct RateLimitError {
    /// Number of seconds until the rate limit resets
    pub retry_after_seconds: u64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
        }
    }

    /// Record a request for `identifier` performing `action`, or reject it
    /// when `max_requests` already fall inside `window`.
    pub fn check_rate_limit(
        &self,
        action: &str,
        identifier: &str,
        max_requests: usize,
        window: Duration,
    ) -> Result<(), RateLimitError> {
        let key = format!("{}:{}", action, identifier);
        let now = Instant::now();

        let mut entry = self.requests.entry(key).or_default();
        entry.retain(|&timestamp| now.duration_since(timestamp) < window);

        if entry.len() >= max_requests {
            let retry_after = match entry.first() {
                Some(&oldest) => window.saturating_sub(now.duration_since(oldest)),
                None => window,
            };
            return Err(RateLimitError {
                retry_after_seconds: retry_after.as_secs() + 1, // Round up
            });
        }

        entry.push(now);
        Ok(())
    }

    /// Drop timestamps older than `window` and keys left empty.
    pub fn cleanup_old_entries(&self, window: Duration) {
        let now = Instant::now();
        self.requests.retain(|_, timestamps| {
            timestamps.retain(|&timestamp| now.duration_since(timestamp) < window);
            !timestamps.is_empty()
        });
    }

    #[cfg(test)]
    pub fn clear_all(&self) {
        self.requests.clear();
    }

    /// Get the number of tracked keys (for monitoring/debugging)
    pub fn tracked_keys_count(&self) -> usize {
        self.requests.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check rate limit for cross-entity searches, keyed by client address
pub fn check_search_rate_limit(identifier: &str) -> Result<(), RateLimitError> {
    let limits = get_rate_limits();
    RATE_LIMITER.check_rate_limit("search", identifier, limits.search_max, limits.search_window)
}

/// Periodic cleanup entry point for the binary's background task.
/// Returns the number of clients still tracked.
pub fn cleanup_old_entries_public() -> usize {
    RATE_LIMITER.cleanup_old_entries(get_rate_limits().search_window);
    RATE_LIMITER.tracked_keys_count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_allows_requests_within_limit() {
        let limiter = RateLimiter::new();

        for i in 0..3 {
            assert!(
                limiter
                    .check_rate_limit("test", "10.0.0.1", 3, Duration::from_secs(10))
                    .is_ok(),
                "Request {} should be allowed",
                i
            );
        }
    }

    #[test]
    fn test_rate_limit_blocks_requests_over_limit() {
        let limiter = RateLimiter::new();

        for _ in 0..3 {
            limiter
                .check_rate_limit("test", "10.0.0.1", 3, Duration::from_secs(10))
                .unwrap();
        }

        let result = limiter.check_rate_limit("test", "10.0.0.1", 3, Duration::from_secs(10));
        let err = result.expect_err("4th request should be blocked");
        assert!(err.retry_after_seconds > 0, "Should have retry_after time");
        assert!(err.retry_after_seconds <= 11);
    }

    #[test]
    fn test_rate_limit_different_identifiers_independent() {
        let limiter = RateLimiter::new();

        for _ in 0..3 {
            limiter
                .check_rate_limit("test", "10.0.0.1", 3, Duration::from_secs(10))
                .unwrap();
        }

        assert!(
            limiter
                .check_rate_limit("test", "10.0.0.2", 3, Duration::from_secs(10))
                .is_ok(),
            "Different identifier should have independent limit"
        );
    }

    #[test]
    fn test_cleanup_drops_expired_keys() {
        let limiter = RateLimiter::new();
        limiter
            .check_rate_limit("test", "10.0.0.1", 10, Duration::from_secs(10))
            .unwrap();
        limiter
            .check_rate_limit("test", "10.0.0.2", 10, Duration::from_secs(10))
            .unwrap();
        assert_eq!(limiter.tracked_keys_count(), 2);

        limiter.cleanup_old_entries(Duration::from_secs(60));
        assert_eq!(limiter.tracked_keys_count(), 2);

        limiter.cleanup_old_entries(Duration::ZERO);
        assert_eq!(limiter.tracked_keys_count(), 0);
    }

    #[test]
    fn test_clear_all() {
        let limiter = RateLimiter::new();
        limiter
            .check_rate_limit("test", "10.0.0.1", 1, Duration::from_secs(10))
            .unwrap();
        limiter.clear_all();
        assert!(limiter
            .check_rate_limit("test", "10.0.0.1", 1, Duration::from_secs(10))
            .is_ok());
    }

    #[test]
    fn test_limits_follow_config() {
        let limits = RateLimits::from_config(&app_config::RateLimitConfig {
            search_max_requests: 5,
            search_window_seconds: 30,
        });
        assert_eq!(limits.search_max, 5);
        assert_eq!(limits.search_window, Duration::from_secs(30));
        assert_eq!(RateLimits::default().search_max, 30);
    }
}
