//! Identity store seam.
//!
//! The gateway only consumes these four lookups; the store itself (users,
//! profiles, OAuth tokens, API keys) belongs to the hosted backend.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Role;

pub use memory::MemoryIdentityStore;
pub use postgres::PgIdentityStore;

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// Credential unknown, expired, revoked or otherwise unusable
    #[error("Invalid credential: {0}")]
    Invalid(String),

    /// The store could not answer
    #[error("Identity store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub role: Role,
    pub school_id: Option<Uuid>,
}

/// Result of OAuth access-token introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIntrospection {
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Absent for client-credential tokens
    pub user_id: Option<Uuid>,
    pub rate_limit_per_minute: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub rate_limit_per_minute: Option<u32>,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_session_user(&self, session_token: &str) -> Result<SessionUser, IdentityError>;

    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, IdentityError>;

    async fn introspect_token(&self, token: &str) -> Result<TokenIntrospection, IdentityError>;

    async fn lookup_api_key(&self, key: &str) -> Result<ApiKeyRecord, IdentityError>;
}
