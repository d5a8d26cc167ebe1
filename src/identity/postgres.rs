use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{ApiKeyRecord, IdentityError, IdentityStore, Profile, SessionUser, TokenIntrospection};

/// Audience the hosted auth service stamps on browser session tokens.
const SESSION_AUDIENCE: &str = "authenticated";

/// Claims of the session JWT carried in the session cookie
#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: Uuid,
    email: Option<String>,
}

/// Identity store backed by the platform's Postgres schema
/// (`auth.users`, `profiles`, `oauth_access_tokens`, `api_keys`,
/// `oauth_applications`).
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
    session_secret: String,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool, session_secret: impl Into<String>) -> Self {
        Self {
            pool,
            session_secret: session_secret.into(),
        }
    }

    fn decode_session(&self, token: &str) -> Result<SessionClaims, IdentityError> {
        if self.session_secret.is_empty() {
            return Err(IdentityError::Unavailable("session JWT secret not configured".into()));
        }

        let key = DecodingKey::from_secret(self.session_secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[SESSION_AUDIENCE]);

        decode::<SessionClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| IdentityError::Invalid(format!("session token rejected: {}", e)))
    }
}

/// Tokens and keys are stored hashed; never by their raw value.
fn hash_secret(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn upstream(context: &str, err: sqlx::Error) -> IdentityError {
    tracing::error!("Identity store query failed ({}): {}", context, err);
    IdentityError::Unavailable(format!("{}: {}", context, err))
}

fn is_expired(expires_at: Option<DateTime<Utc>>) -> bool {
    expires_at.map(|at| at < Utc::now()).unwrap_or(false)
}

fn per_minute(limit: Option<i32>) -> Option<u32> {
    limit.and_then(|l| u32::try_from(l).ok()).filter(|l| *l > 0)
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn get_session_user(&self, session_token: &str) -> Result<SessionUser, IdentityError> {
        let claims = self.decode_session(session_token)?;

        let row = sqlx::query("SELECT id, email FROM auth.users WHERE id = $1")
            .bind(claims.sub)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| upstream("session user", e))?
            .ok_or_else(|| IdentityError::Invalid(format!("session user {} no longer exists", claims.sub)))?;

        let email: Option<String> = row.try_get("email").map_err(|e| upstream("session user", e))?;

        Ok(SessionUser {
            user_id: claims.sub,
            email: email.or(claims.email),
        })
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, IdentityError> {
        let row = sqlx::query("SELECT role, school_id FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| upstream("profile", e))?
            .ok_or_else(|| IdentityError::Invalid(format!("no profile for user {}", user_id)))?;

        let role: String = row.try_get("role").map_err(|e| upstream("profile", e))?;
        let school_id: Option<Uuid> = row.try_get("school_id").map_err(|e| upstream("profile", e))?;

        let role = role.parse().map_err(IdentityError::Invalid)?;

        Ok(Profile { role, school_id })
    }

    async fn introspect_token(&self, token: &str) -> Result<TokenIntrospection, IdentityError> {
        let query = r#"
            SELECT
                t.id, t.user_id, t.scopes, t.expires_at, t.revoked,
                a.client_id, a.is_active, a.rate_limit_per_minute
            FROM oauth_access_tokens t
            JOIN oauth_applications a ON a.id = t.application_id
            WHERE t.token_hash = $1
        "#;

        let row = sqlx::query(query)
            .bind(hash_secret(token))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| upstream("token introspection", e))?
            .ok_or_else(|| IdentityError::Invalid("access token not found".into()))?;

        let get = |e| upstream("token introspection", e);
        let token_id: Uuid = row.try_get("id").map_err(get)?;
        let revoked: bool = row.try_get("revoked").map_err(get)?;
        let expires_at: Option<DateTime<Utc>> = row.try_get("expires_at").map_err(get)?;
        let app_active: bool = row.try_get("is_active").map_err(get)?;

        if revoked {
            return Err(IdentityError::Invalid("access token has been revoked".into()));
        }
        if is_expired(expires_at) {
            return Err(IdentityError::Invalid("access token has expired".into()));
        }
        if !app_active {
            return Err(IdentityError::Invalid("application has been disabled".into()));
        }

        // Usage bookkeeping must never fail the request
        if let Err(e) = sqlx::query("UPDATE oauth_access_tokens SET last_used_at = now() WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await
        {
            tracing::warn!("Failed to record access token use: {}", e);
        }

        Ok(TokenIntrospection {
            client_id: row.try_get("client_id").map_err(get)?,
            scopes: row.try_get("scopes").map_err(get)?,
            user_id: row.try_get("user_id").map_err(get)?,
            rate_limit_per_minute: per_minute(row.try_get("rate_limit_per_minute").map_err(get)?),
        })
    }

    async fn lookup_api_key(&self, key: &str) -> Result<ApiKeyRecord, IdentityError> {
        let query = r#"
            SELECT
                k.id, k.scopes, k.expires_at, k.revoked, k.is_active,
                k.rate_limit_per_minute,
                a.client_id, a.is_active AS app_active
            FROM api_keys k
            JOIN oauth_applications a ON a.id = k.application_id
            WHERE k.key_hash = $1
        "#;

        let row = sqlx::query(query)
            .bind(hash_secret(key))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| upstream("api key lookup", e))?
            .ok_or_else(|| IdentityError::Invalid("api key not found".into()))?;

        let get = |e| upstream("api key lookup", e);
        let key_id: Uuid = row.try_get("id").map_err(get)?;
        let revoked: bool = row.try_get("revoked").map_err(get)?;
        let active: bool = row.try_get("is_active").map_err(get)?;
        let app_active: bool = row.try_get("app_active").map_err(get)?;
        let expires_at: Option<DateTime<Utc>> = row.try_get("expires_at").map_err(get)?;

        if revoked || !active {
            return Err(IdentityError::Invalid("api key has been revoked or disabled".into()));
        }
        if is_expired(expires_at) {
            return Err(IdentityError::Invalid("api key has expired".into()));
        }
        if !app_active {
            return Err(IdentityError::Invalid("application has been disabled".into()));
        }

        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = now() WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await
        {
            tracing::warn!("Failed to record api key use: {}", e);
        }

        Ok(ApiKeyRecord {
            client_id: row.try_get("client_id").map_err(get)?,
            scopes: row.try_get("scopes").map_err(get)?,
            rate_limit_per_minute: per_minute(row.try_get("rate_limit_per_minute").map_err(get)?),
        })
    }
}
