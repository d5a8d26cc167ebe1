use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::housekeeping::Sweep;

/// Remembers accepted signatures so a captured request cannot be replayed
/// inside the freshness window.
pub struct ReplayGuard {
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl ReplayGuard {
    /// `ttl` must cover the whole span a timestamp can be accepted in,
    /// i.e. twice the freshness window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Record `signature`; false when it was already seen and not expired.
    pub async fn remember(&self, signature: &str, now: Instant) -> bool {
        let key = signature.to_ascii_lowercase();
        let mut seen = self.seen.lock().await;
        match seen.get(&key) {
            Some(expires_at) if *expires_at > now => false,
            _ => {
                seen.insert(key, now + self.ttl);
                true
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }
}

#[async_trait]
impl Sweep for ReplayGuard {
    fn name(&self) -> &'static str {
        "replay guard"
    }

    async fn sweep(&self, now: Instant) -> usize {
        let mut seen = self.seen.lock().await;
        let before = seen.len();
        seen.retain(|_, expires_at| *expires_at > now);
        before - seen.len()
    }
}
