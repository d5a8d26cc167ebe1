use thiserror::Error;

/// Why a request was refused before reaching its handler.
///
/// Messages carried by the variants are for server-side logs. What the
/// client sees is decided by [`crate::error::ApiError`], which never echoes
/// signature or upstream details.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential, or none of the presented credentials validated.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Valid identity without the role, scope or tenant the route needs.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The signed envelope could not be parsed into payload/signature/timestamp.
    #[error("malformed signed payload: {0}")]
    MalformedPayload(String),

    /// HMAC did not match, or no secret was available to check it.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Timestamp outside the freshness window (expired or in the future).
    #[error("stale timestamp: {0}")]
    StaleTimestamp(String),

    /// Signature already seen inside the freshness window.
    #[error("replayed signature")]
    ReplayedSignature,

    /// The identity store failed or timed out. Distinct from
    /// `Unauthenticated` so callers answer 503 rather than 401.
    #[error("identity store unavailable: {0}")]
    IdentityStoreUnavailable(String),
}

impl AuthError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        AuthError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AuthError::Forbidden(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        AuthError::MalformedPayload(message.into())
    }

    pub fn invalid_signature(message: impl Into<String>) -> Self {
        AuthError::InvalidSignature(message.into())
    }

    pub fn stale(message: impl Into<String>) -> Self {
        AuthError::StaleTimestamp(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        AuthError::IdentityStoreUnavailable(message.into())
    }

    /// True for failures the caller may retry unchanged after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::IdentityStoreUnavailable(_))
    }
}
