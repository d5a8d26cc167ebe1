use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ApiKeyRecord, IdentityError, IdentityStore, Profile, SessionUser, TokenIntrospection};

#[derive(Default)]
struct Records {
    sessions: HashMap<String, SessionUser>,
    profiles: HashMap<Uuid, Profile>,
    tokens: HashMap<String, TokenIntrospection>,
    api_keys: HashMap<String, ApiKeyRecord>,
}

/// In-process identity store for local development and tests.
///
/// Cloning shares the underlying records, so a test can keep a handle and
/// change profiles or availability while the gateway is serving.
#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    records: Arc<RwLock<Records>>,
    unavailable: Arc<AtomicBool>,
    latency: Arc<RwLock<Option<Duration>>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_session(&self, token: &str, user_id: Uuid, email: Option<&str>) {
        self.records.write().await.sessions.insert(
            token.to_string(),
            SessionUser {
                user_id,
                email: email.map(str::to_string),
            },
        );
    }

    pub async fn remove_session(&self, token: &str) {
        self.records.write().await.sessions.remove(token);
    }

    pub async fn insert_profile(&self, user_id: Uuid, profile: Profile) {
        self.records.write().await.profiles.insert(user_id, profile);
    }

    pub async fn insert_token(&self, token: &str, introspection: TokenIntrospection) {
        self.records.write().await.tokens.insert(token.to_string(), introspection);
    }

    pub async fn insert_api_key(&self, key: &str, record: ApiKeyRecord) {
        self.records.write().await.api_keys.insert(key.to_string(), record);
    }

    /// Simulate an outage: every lookup fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every lookup, e.g. to exercise upstream timeouts.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    /// Number of lookups served since creation.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_session_user(&self, session_token: &str) -> Result<SessionUser, IdentityError> {
        self.enter().await?;
        self.records
            .read()
            .await
            .sessions
            .get(session_token)
            .cloned()
            .ok_or_else(|| IdentityError::Invalid("unknown session".into()))
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, IdentityError> {
        self.enter().await?;
        self.records
            .read()
            .await
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| IdentityError::Invalid(format!("no profile for user {}", user_id)))
    }

    async fn introspect_token(&self, token: &str) -> Result<TokenIntrospection, IdentityError> {
        self.enter().await?;
        self.records
            .read()
            .await
            .tokens
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::Invalid("unknown access token".into()))
    }

    async fn lookup_api_key(&self, key: &str) -> Result<ApiKeyRecord, IdentityError> {
        self.enter().await?;
        self.records
            .read()
            .await
            .api_keys
            .get(key)
            .cloned()
            .ok_or_else(|| IdentityError::Invalid("unknown api key".into()))
    }
}
