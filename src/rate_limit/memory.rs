use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{RateLimitDecision, RateLimitStore};
use crate::housekeeping::Sweep;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: Instant,
    window: Duration,
    count: u32,
}

impl Bucket {
    fn ends_at(&self) -> Instant {
        self.window_start + self.window
    }
}

/// Process-local fixed-window counters.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A window starts at the first call for a key and lasts `window`; the
    /// call that finds an elapsed window opens the next one.
    pub async fn check_and_consume_at(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let mut buckets = self.buckets.lock().await;

        let bucket = buckets
            .entry(key.to_string())
            .and_modify(|bucket| {
                if now >= bucket.ends_at() {
                    *bucket = Bucket {
                        window_start: now,
                        window,
                        count: 0,
                    };
                }
            })
            .or_insert(Bucket {
                window_start: now,
                window,
                count: 0,
            });

        let allowed = bucket.count < limit;
        if allowed {
            bucket.count += 1;
        }

        let reset_in = bucket.ends_at().saturating_duration_since(now);
        RateLimitDecision {
            allowed,
            limit,
            remaining: limit.saturating_sub(bucket.count),
            reset_at: Utc::now() + chrono::Duration::from_std(reset_in).unwrap_or_else(|_| chrono::Duration::zero()),
            reset_in,
        }
    }

    pub async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_consume(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.check_and_consume_at(key, limit, window, Instant::now()).await
    }
}

#[async_trait]
impl Sweep for MemoryRateLimitStore {
    fn name(&self) -> &'static str {
        "rate limit buckets"
    }

    async fn sweep(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.ends_at() > now);
        before - buckets.len()
    }
}
