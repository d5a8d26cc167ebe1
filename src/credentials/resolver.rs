use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::cache::CredentialCache;
use super::extract::{extract_credentials, Credential};
use crate::auth::{AuthError, CredentialSource, Principal};
use crate::identity::{IdentityError, IdentityStore};

type PendingLookup = Shared<BoxFuture<'static, Result<Principal, AuthError>>>;
type PendingMap = Arc<Mutex<HashMap<String, PendingLookup>>>;

/// Drops a credential's in-flight entry once its caller is done, whether the
/// lookup finished or the caller was cancelled.
struct PendingGuard {
    pending: PendingMap,
    key: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.try_lock() {
            pending.remove(&self.key);
            return;
        }
        let pending = self.pending.clone();
        let key = std::mem::take(&mut self.key);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                pending.lock().await.remove(&key);
            });
        }
    }
}

/// Turns the credentials on a request into a verified [`Principal`].
pub struct CredentialResolver {
    store: Arc<dyn IdentityStore>,
    cache: Arc<CredentialCache>,
    pending: PendingMap,
    timeout: Duration,
    cookie_name: String,
}

impl CredentialResolver {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        cache: Arc<CredentialCache>,
        timeout: Duration,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cache,
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cache(&self) -> &Arc<CredentialCache> {
        &self.cache
    }

    pub fn credentials(&self, headers: &HeaderMap) -> Vec<Credential> {
        extract_credentials(headers, &self.cookie_name)
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        self.resolve_credentials(&self.credentials(headers)).await
    }

    /// Try each credential in precedence order. An invalid credential falls
    /// through to the next one; an unavailable identity store stops the walk
    /// so an outage is never reported as a bad credential.
    pub async fn resolve_credentials(&self, credentials: &[Credential]) -> Result<Principal, AuthError> {
        let mut last_error = None;

        for credential in credentials {
            match self.resolve_one(credential).await {
                Ok(principal) => return Ok(principal),
                Err(err @ AuthError::IdentityStoreUnavailable(_)) => return Err(err),
                Err(err) => {
                    tracing::debug!("{:?} rejected: {}", credential.kind(), err);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AuthError::unauthenticated("no credential presented")))
    }

    async fn resolve_one(&self, credential: &Credential) -> Result<Principal, AuthError> {
        let key = credential.cache_key();

        if let Some(principal) = self.cache.get(&key).await {
            tracing::trace!("Credential cache hit for {:?}", credential.kind());
            return Ok(principal);
        }

        // Concurrent requests with the same credential share one lookup
        let shared = {
            let mut pending = self.pending.lock().await;
            match pending.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let store = self.store.clone();
                    let cache = self.cache.clone();
                    let credential = credential.clone();
                    let cache_key = key.clone();
                    let timeout = self.timeout;
                    let shared = async move {
                        let result = lookup(store, credential, timeout).await;
                        if let Ok(principal) = &result {
                            cache.insert(cache_key, principal.clone()).await;
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    pending.insert(key.clone(), shared.clone());
                    shared
                }
            }
        };

        let _guard = PendingGuard {
            pending: self.pending.clone(),
            key,
        };
        shared.await
    }

    /// Lookups currently in flight.
    pub async fn pending_lookups(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Forget the cached principals for the credentials on this request.
    pub async fn logout(&self, headers: &HeaderMap) -> usize {
        let mut removed = 0;
        for credential in self.credentials(headers) {
            let key = credential.cache_key();
            self.pending.lock().await.remove(&key);
            if self.cache.invalidate(&key).await {
                removed += 1;
            }
        }
        removed
    }

    /// Revocation signal from the identity store.
    pub async fn revoke_user(&self, user_id: Uuid) -> usize {
        self.pending.lock().await.retain(|_, lookup| {
            !matches!(lookup.peek(), Some(Ok(principal)) if principal.user_id == Some(user_id))
        });
        let removed = self.cache.invalidate_user(user_id).await;
        tracing::info!("Revoked {} cached credentials for user {}", removed, user_id);
        removed
    }
}

async fn lookup(
    store: Arc<dyn IdentityStore>,
    credential: Credential,
    timeout: Duration,
) -> Result<Principal, AuthError> {
    match tokio::time::timeout(timeout, introspect(store.as_ref(), &credential)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Identity store did not answer {:?} lookup within {:?}", credential.kind(), timeout);
            Err(AuthError::unavailable(format!("identity store timed out after {:?}", timeout)))
        }
    }
}

fn from_identity(err: IdentityError) -> AuthError {
    match err {
        IdentityError::Invalid(msg) => AuthError::Unauthenticated(msg),
        IdentityError::Unavailable(msg) => {
            tracing::error!("Identity store unavailable: {}", msg);
            AuthError::IdentityStoreUnavailable(msg)
        }
    }
}

async fn introspect(store: &dyn IdentityStore, credential: &Credential) -> Result<Principal, AuthError> {
    match credential {
        Credential::Bearer(token) => {
            let grant = store.introspect_token(token).await.map_err(from_identity)?;
            let scopes: BTreeSet<String> = grant.scopes.into_iter().collect();
            let source = CredentialSource::Bearer {
                client_id: grant.client_id,
            };

            match grant.user_id {
                Some(user_id) => {
                    let profile = store.get_profile(user_id).await.map_err(from_identity)?;
                    Ok(Principal {
                        user_id: Some(user_id),
                        email: None,
                        role: Some(profile.role),
                        school_id: profile.school_id,
                        scopes,
                        source,
                        rate_limit_per_minute: grant.rate_limit_per_minute,
                    })
                }
                None => Ok(Principal {
                    user_id: None,
                    email: None,
                    role: None,
                    school_id: None,
                    scopes,
                    source,
                    rate_limit_per_minute: grant.rate_limit_per_minute,
                }),
            }
        }
        Credential::ApiKey(key) => {
            let record = store.lookup_api_key(key).await.map_err(from_identity)?;
            Ok(Principal {
                user_id: None,
                email: None,
                role: None,
                school_id: None,
                scopes: record.scopes.into_iter().collect(),
                source: CredentialSource::ApiKey {
                    client_id: record.client_id,
                },
                rate_limit_per_minute: record.rate_limit_per_minute,
            })
        }
        Credential::SessionCookie(session) => {
            let user = store.get_session_user(session).await.map_err(from_identity)?;
            let profile = store.get_profile(user.user_id).await.map_err(from_identity)?;
            Ok(Principal::session(user.user_id, user.email, profile.role, profile.school_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::identity::{ApiKeyRecord, MemoryIdentityStore, Profile, TokenIntrospection};
    use axum::http::HeaderValue;

    fn resolver(store: &MemoryIdentityStore) -> CredentialResolver {
        CredentialResolver::new(
            Arc::new(store.clone()),
            Arc::new(CredentialCache::new(Duration::from_secs(30), 1000)),
            Duration::from_millis(200),
            "sb-access-token",
        )
    }

    fn cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_str(&format!("sb-access-token={}", value)).unwrap(),
        );
        headers
    }

    async fn seed_teacher(store: &MemoryIdentityStore, session: &str) -> (Uuid, Uuid) {
        let user = Uuid::new_v4();
        let school = Uuid::new_v4();
        store.insert_session(session, user, Some("t@example.com")).await;
        store
            .insert_profile(user, Profile { role: Role::Teacher, school_id: Some(school) })
            .await;
        (user, school)
    }

    #[tokio::test]
    async fn session_principal_matches_profile() {
        let store = MemoryIdentityStore::new();
        let (user, school) = seed_teacher(&store, "sess-1").await;

        let principal = resolver(&store).resolve(&cookie("sess-1")).await.unwrap();
        assert_eq!(principal.user_id, Some(user));
        assert_eq!(principal.role, Some(Role::Teacher));
        assert_eq!(principal.school_id, Some(school));
        assert_eq!(principal.source, CredentialSource::Session);
    }

    #[tokio::test]
    async fn no_credential_is_unauthenticated() {
        let store = MemoryIdentityStore::new();
        let err = resolver(&store).resolve(&HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_bearer_falls_through_to_cookie() {
        let store = MemoryIdentityStore::new();
        let (user, _) = seed_teacher(&store, "sess-2").await;

        let mut headers = cookie("sess-2");
        headers.insert("authorization", HeaderValue::from_static("Bearer unknown"));

        let principal = resolver(&store).resolve(&headers).await.unwrap();
        assert_eq!(principal.user_id, Some(user));
    }

    #[tokio::test]
    async fn outage_is_not_reported_as_unauthenticated() {
        let store = MemoryIdentityStore::new();
        seed_teacher(&store, "sess-3").await;
        store.set_unavailable(true);

        let err = resolver(&store).resolve(&cookie("sess-3")).await.unwrap_err();
        assert!(matches!(err, AuthError::IdentityStoreUnavailable(_)));
    }

    #[tokio::test]
    async fn slow_store_times_out_as_unavailable() {
        let store = MemoryIdentityStore::new();
        seed_teacher(&store, "sess-4").await;
        store.set_latency(Some(Duration::from_secs(2))).await;

        let err = resolver(&store).resolve(&cookie("sess-4")).await.unwrap_err();
        assert!(matches!(err, AuthError::IdentityStoreUnavailable(_)));
    }

    #[tokio::test]
    async fn cached_until_logout() {
        let store = MemoryIdentityStore::new();
        seed_teacher(&store, "sess-5").await;
        let resolver = resolver(&store);

        resolver.resolve(&cookie("sess-5")).await.unwrap();
        let calls = store.calls();
        resolver.resolve(&cookie("sess-5")).await.unwrap();
        assert_eq!(store.calls(), calls, "second resolution should hit the cache");

        assert_eq!(resolver.logout(&cookie("sess-5")).await, 1);
        store.remove_session("sess-5").await;
        let err = resolver.resolve(&cookie("sess-5")).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn concurrent_lookups_are_shared() {
        let store = MemoryIdentityStore::new();
        seed_teacher(&store, "sess-6").await;
        store.set_latency(Some(Duration::from_millis(50))).await;
        let resolver = Arc::new(resolver(&store));

        let headers = cookie("sess-6");
        let (a, b, c) = tokio::join!(
            resolver.resolve(&headers),
            resolver.resolve(&headers),
            resolver.resolve(&headers)
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        // One session lookup plus one profile lookup
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn bearer_token_carries_user_and_scopes() {
        let store = MemoryIdentityStore::new();
        let user = Uuid::new_v4();
        store
            .insert_profile(user, Profile { role: Role::Teacher, school_id: None })
            .await;
        store
            .insert_token(
                "tok",
                TokenIntrospection {
                    client_id: "gradebook".into(),
                    scopes: vec!["students:read".into()],
                    user_id: Some(user),
                    rate_limit_per_minute: Some(60),
                },
            )
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok"));
        let principal = resolver(&store).resolve(&headers).await.unwrap();

        assert!(principal.has_scope("students:read"));
        assert_eq!(principal.client_id(), Some("gradebook"));
        assert_eq!(principal.rate_limit_per_minute, Some(60));
        assert_eq!(principal.role, Some(Role::Teacher));
    }

    #[tokio::test]
    async fn api_key_is_a_machine_principal() {
        let store = MemoryIdentityStore::new();
        store
            .insert_api_key(
                "key-1",
                ApiKeyRecord {
                    client_id: "sis-export".into(),
                    scopes: vec!["school.read".into()],
                    rate_limit_per_minute: None,
                },
            )
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("key-1"));
        let principal = resolver(&store).resolve(&headers).await.unwrap();
        assert!(principal.is_machine());
        assert!(principal.role.is_none());
        assert_eq!(principal.caller_key().as_deref(), Some("client:sis-export"));
    }

    #[tokio::test]
    async fn revoking_a_user_drops_cached_principals() {
        let store = MemoryIdentityStore::new();
        let (user, _) = seed_teacher(&store, "sess-7").await;
        let resolver = resolver(&store);

        resolver.resolve(&cookie("sess-7")).await.unwrap();
        assert_eq!(resolver.revoke_user(user).await, 1);
        assert!(resolver.cache().is_empty().await);
    }

    #[tokio::test]
    async fn cancelled_lookup_leaves_nothing_pending() {
        let store = MemoryIdentityStore::new();
        seed_teacher(&store, "sess-8").await;
        store.set_latency(Some(Duration::from_millis(100))).await;
        let resolver = resolver(&store);

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), resolver.resolve(&cookie("sess-8"))).await;
        assert!(cancelled.is_err());
        assert_eq!(resolver.pending_lookups().await, 0);

        store.set_latency(None).await;
        store.remove_session("sess-8").await;
        let err = resolver.resolve(&cookie("sess-8")).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
        assert_eq!(resolver.pending_lookups().await, 0);
    }

    #[tokio::test]
    async fn logout_drops_an_in_flight_lookup() {
        let store = MemoryIdentityStore::new();
        seed_teacher(&store, "sess-9").await;
        store.set_latency(Some(Duration::from_millis(100))).await;
        let resolver = Arc::new(resolver(&store));

        let first = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve(&cookie("sess-9")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(resolver.pending_lookups().await, 1);

        resolver.logout(&cookie("sess-9")).await;
        assert_eq!(resolver.pending_lookups().await, 0);
        assert!(first.await.unwrap().is_ok());
    }
}
