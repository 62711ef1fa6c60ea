//! Fixed-window admission control per named limiter.
//!
//! A limiter admits at most `capacity` acquisitions per window. The window
//! starts at the first acquisition after the previous one expired.
//! Rejections are immediate; nothing is queued.

use crate::core::config::RateLimitConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

pub trait Limiter: Send + Sync {
    /// Takes one slot from `name`'s current window, or reports it is full.
    fn try_acquire(&self, name: &str) -> bool;
}

struct Window {
    started_at: Instant,
    count: u32,
}

pub struct FixedWindowLimiter {
    limits: HashMap<String, RateLimitConfig>,
    default_limit: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(limits: HashMap<String, RateLimitConfig>, default_limit: RateLimitConfig) -> Self {
        Self {
            limits,
            default_limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn limit_for(&self, name: &str) -> RateLimitConfig {
        self.limits.get(name).copied().unwrap_or(self.default_limit)
    }
}

impl Limiter for FixedWindowLimiter {
    fn try_acquire(&self, name: &str) -> bool {
        let limit = self.limit_for(name);
        let now = Instant::now();

        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let window = windows.entry(name.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(window.started_at) >= limit.window() {
            window.started_at = now;
            window.count = 0;
        }

        if window.count < limit.capacity {
            window.count += 1;
            true
        } else {
            warn!(limiter = %name, capacity = limit.capacity, "Rate limit exceeded");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(capacity: u32, window_ms: u64) -> FixedWindowLimiter {
        let limit = RateLimitConfig {
            capacity,
            window_ms,
        };
        FixedWindowLimiter::new(HashMap::from([("quotes".to_string(), limit)]), limit)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_over_capacity_until_window_rolls() {
        let limiter = limiter(5, 1_000);

        for _ in 0..5 {
            assert!(limiter.try_acquire("quotes"));
        }
        assert!(!limiter.try_acquire("quotes"));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!limiter.try_acquire("quotes"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.try_acquire("quotes"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiters_are_independent() {
        let limits = HashMap::from([
            (
                "quotes".to_string(),
                RateLimitConfig {
                    capacity: 1,
                    window_ms: 1_000,
                },
            ),
            (
                "historical".to_string(),
                RateLimitConfig {
                    capacity: 2,
                    window_ms: 1_000,
                },
            ),
        ]);
        let limiter = FixedWindowLimiter::new(limits, RateLimitConfig::default());

        assert!(limiter.try_acquire("quotes"));
        assert!(!limiter.try_acquire("quotes"));
        assert!(limiter.try_acquire("historical"));
        assert!(limiter.try_acquire("historical"));
        assert!(!limiter.try_acquire("historical"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_name_uses_default_limit() {
        let limiter = limiter(1, 1_000);
        assert!(limiter.try_acquire("ingest"));
        assert!(!limiter.try_acquire("ingest"));
    }
}
