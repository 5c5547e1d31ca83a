//! Per-host token bucket rate limiting
//!
//! Every host gets its own bucket holding up to `burst` tokens, refilled at
//! `rps` tokens per second. A request takes one token and waits when the
//! bucket is empty. The clock is `tokio::time::Instant`, so limiter behavior
//! is deterministic under a paused test runtime.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket limiter keyed by host
#[derive(Debug)]
pub struct HostRateLimiter {
    /// Tokens per second; zero or less disables limiting
    rate: f64,
    capacity: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl HostRateLimiter {
    /// Creates a limiter
    ///
    /// # Arguments
    ///
    /// * `requests_per_second` - Sustained rate per host (`0` disables limiting)
    /// * `burst` - Bucket capacity; a fresh host may send this many requests at once
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        Self {
            rate: requests_per_second,
            capacity: f64::from(burst.max(1)),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if requests are never delayed
    pub fn is_unlimited(&self) -> bool {
        self.rate <= 0.0
    }

    /// Waits until a token for `host` is available and takes it
    pub async fn acquire(&self, host: &str) {
        if self.is_unlimited() {
            return;
        }

        loop {
            let wait = match self.try_acquire(host, Instant::now()) {
                None => return,
                Some(wait) => wait,
            };

            tracing::trace!("Rate limit for {}: waiting {:?}", host, wait);
            sleep(wait).await;
        }
    }

    /// Takes a token if one is available, otherwise returns how long to wait
    fn try_acquire(&self, host: &str, now: Instant) -> Option<Duration> {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let bucket = buckets.entry(host.to_string()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return None;
        }

        let seconds = ((1.0 - bucket.tokens) / self.rate).max(0.001);
        Some(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
    }
}
