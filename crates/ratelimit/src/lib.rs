//! Per-key fixed-window rate limiting.
//!
//! Each key tracks its own window; concurrent access to *different* keys
//! never contends, using a bucket-per-client design generalized to
//! `{capacity, windowMs}` supplied per call instead of fixed at construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::RwLock;

/// Identifies the subject a rate-limit key belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Ip(String),
    Function(String),
}

impl Subject {
    pub fn key(&self) -> String {
        match self {
            Subject::Ip(addr) => format!("ip:{addr}"),
            Subject::Function(id) => format!("fn:{id}"),
        }
    }

    /// Extract the IP subject from request headers: prefer
    /// `CF-Connecting-IP`, else the first `X-Forwarded-For` entry, else
    /// `"unknown"`.
    pub fn from_headers(cf_connecting_ip: Option<&str>, x_forwarded_for: Option<&str>) -> Self {
        let addr = cf_connecting_ip
            .map(str::to_string)
            .or_else(|| {
                x_forwarded_for
                    .and_then(|v| v.split(',').next())
                    .map(|s| s.trim().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());
        Subject::Ip(addr)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Outcome of a `check_and_increment` call.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub reset_at: Instant,
}

impl Decision {
    /// Seconds to report in `Retry-After`, rounded up.
    pub fn retry_after_secs(&self, now: Instant) -> u64 {
        let remaining = self.reset_at.saturating_duration_since(now);
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }
}

/// A fixed-window limiter serialized per key, lock-free across keys.
///
/// The outer map is only locked briefly to fetch or insert a key's bucket
/// mutex; the actual check-and-increment happens under the per-key lock.
#[derive(Default)]
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Arc<AsyncMutex<Bucket>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn bucket_for(&self, key: &str) -> Arc<AsyncMutex<Bucket>> {
        if let Some(b) = self.buckets.read().await.get(key) {
            return b.clone();
        }
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(AsyncMutex::new(Bucket {
                    window_start: Instant::now(),
                    count: 0,
                }))
            })
            .clone()
    }

    /// Checks and increments the bucket for `key`, using the wall clock. See
    /// [`RateLimiter::check_and_increment_at`] for the deterministic,
    /// testable variant.
    pub async fn check_and_increment(&self, key: &str, capacity: u32, window: Duration) -> Decision {
        self.check_and_increment_at(key, capacity, window, Instant::now()).await
    }

    pub async fn check_and_increment_at(
        &self,
        key: &str,
        capacity: u32,
        window: Duration,
        now: Instant,
    ) -> Decision {
        let bucket = self.bucket_for(key).await;
        let mut guard = bucket.lock().await;

        if now.duration_since(guard.window_start) >= window {
            guard.window_start = now;
            guard.count = 0;
        }

        let reset_at = guard.window_start + window;
        if guard.count < capacity {
            guard.count += 1;
            Decision { allowed: true, reset_at }
        } else {
            Decision { allowed: false, reset_at }
        }
    }

    /// Drop buckets whose window has long expired, bounding memory growth
    /// under many distinct keys (IPs in particular).
    pub async fn sweep_expired(&self, max_idle: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        let mut stale = Vec::new();
        for (key, bucket) in buckets.iter() {
            let guard = bucket.lock().await;
            if now.duration_since(guard.window_start) > max_idle {
                stale.push(key.clone());
            }
        }
        for key in stale {
            buckets.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_capacity_then_refuses() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        for _ in 0..2 {
            let d = limiter.check_and_increment("ip:1.2.3.4", 2, window).await;
            assert!(d.allowed);
        }
        let refused = limiter.check_and_increment("ip:1.2.3.4", 2, window).await;
        assert!(!refused.allowed);
    }

    #[tokio::test]
    async fn window_rolls_over_after_expiry() {
        let limiter = RateLimiter::new();
        let window = Duration::from_millis(50);
        let t0 = Instant::now();
        assert!(limiter.check_and_increment_at("k", 1, window, t0).await.allowed);
        assert!(!limiter.check_and_increment_at("k", 1, window, t0).await.allowed);

        let t1 = t0 + Duration::from_millis(60);
        let rolled = limiter.check_and_increment_at("k", 1, window, t1).await;
        assert!(rolled.allowed);
    }

    #[tokio::test]
    async fn distinct_keys_have_independent_buckets() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        assert!(limiter.check_and_increment("ip:a", 1, window).await.allowed);
        assert!(limiter.check_and_increment("ip:b", 1, window).await.allowed);
    }

    #[test]
    fn retry_after_rounds_up() {
        let now = Instant::now();
        let decision = Decision {
            allowed: false,
            reset_at: now + Duration::from_millis(1500),
        };
        assert_eq!(decision.retry_after_secs(now), 2);
    }

    #[test]
    fn subject_prefers_cf_connecting_ip_over_forwarded_for() {
        let s = Subject::from_headers(Some("9.9.9.9"), Some("1.1.1.1, 2.2.2.2"));
        assert_eq!(s.key(), "ip:9.9.9.9");
    }

    #[test]
    fn subject_falls_back_to_first_forwarded_for_entry() {
        let s = Subject::from_headers(None, Some("1.1.1.1, 2.2.2.2"));
        assert_eq!(s.key(), "ip:1.1.1.1");
    }

    #[test]
    fn subject_defaults_to_unknown() {
        let s = Subject::from_headers(None, None);
        assert_eq!(s.key(), "ip:unknown");
    }

    #[test]
    fn function_subject_key_format() {
        let s = Subject::Function("my-fn".into());
        assert_eq!(s.key(), "fn:my-fn");
    }
}
