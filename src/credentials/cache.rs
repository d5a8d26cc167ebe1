use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Principal;
use crate::housekeeping::Sweep;

#[derive(Debug, Clone)]
struct CacheEntry {
    principal: Principal,
    expires_at: Instant,
}

/// Short-TTL cache of resolved principals keyed by credential hash.
///
/// Expiry is checked on every read, so a missed sweep only delays memory
/// reclamation.
pub struct CredentialCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl CredentialCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<Principal> {
        self.get_at(key, Instant::now()).await
    }

    pub async fn get_at(&self, key: &str, now: Instant) -> Option<Principal> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.principal.clone())
    }

    pub async fn insert(&self, key: String, principal: Principal) {
        self.insert_at(key, principal, Instant::now()).await
    }

    pub async fn insert_at(&self, key: String, principal: Principal, now: Instant) {
        let mut entries = self.entries.write().await;

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                principal,
                expires_at: now + self.ttl,
            },
        );
    }

    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop every entry belonging to a user (revocation signal).
    pub async fn invalidate_user(&self, user_id: Uuid) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.principal.user_id != Some(user_id));
        before - entries.len()
    }

    pub async fn purge_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Sweep for CredentialCache {
    fn name(&self) -> &'static str {
        "credential cache"
    }

    async fn sweep(&self, now: Instant) -> usize {
        self.purge_expired(now).await
    }
}
