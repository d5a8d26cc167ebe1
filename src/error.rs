// HTTP API Error Types
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::auth::AuthError;
use crate::database::{DatabaseError, ScopedError};
use crate::gateway::GatewayError;
use crate::rate_limit::RateLimitDecision;

/// HTTP API error with appropriate status codes and client-safe messages.
///
/// Detail that could help an attacker (why a signature failed, what the
/// identity store said) is logged where the error is raised and never
/// carried here.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    MalformedPayload(String),

    // 401 Unauthorized
    Unauthenticated(String),
    InvalidSignature,
    StaleTimestamp,
    ReplayedSignature,

    // 403 Forbidden
    Forbidden(String),
    NoPolicy,

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed,

    // 429 Too Many Requests
    RateLimited(RateLimitDecision),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    IdentityUnavailable,
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_)
            | ApiError::InvalidSignature
            | ApiError::StaleTimestamp
            | ApiError::ReplayedSignature => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::NoPolicy => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::IdentityUnavailable | ApiError::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::MalformedPayload(msg)
            | ApiError::Unauthenticated(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::InvalidSignature | ApiError::ReplayedSignature => "invalid signature",
            ApiError::StaleTimestamp => "request timestamp outside the allowed window",
            ApiError::NoPolicy => "route not available",
            ApiError::MethodNotAllowed => "method not allowed",
            ApiError::RateLimited(_) => "rate limit exceeded",
            ApiError::IdentityUnavailable => "identity service unavailable",
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::InvalidSignature | ApiError::ReplayedSignature => "INVALID_SIGNATURE",
            ApiError::StaleTimestamp => "STALE_TIMESTAMP",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NoPolicy => "NO_POLICY",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiError::RateLimited(_) => "RATE_LIMITED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::IdentityUnavailable => "IDENTITY_UNAVAILABLE",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code(),
        });
        if let ApiError::RateLimited(decision) = self {
            body["retry_after"] = json!(decision.retry_after_secs());
        }
        body
    }

    /// `WWW-Authenticate` challenge for routes that take OAuth bearer tokens.
    pub fn bearer_challenge(&self) -> Option<HeaderValue> {
        let error = match self {
            ApiError::Unauthenticated(_) => "invalid_token",
            ApiError::Forbidden(_) => "insufficient_scope",
            _ => return None,
        };
        HeaderValue::from_str(&format!(
            "Bearer error=\"{}\", error_description=\"{}\"",
            error,
            self.message()
        ))
        .ok()
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated(_) => ApiError::unauthenticated("authentication required"),
            AuthError::Forbidden(_) => ApiError::forbidden("insufficient permissions"),
            AuthError::MalformedPayload(detail) => {
                tracing::debug!("Malformed signed payload: {}", detail);
                ApiError::MalformedPayload("malformed signed payload".into())
            }
            AuthError::InvalidSignature(_) => ApiError::InvalidSignature,
            AuthError::StaleTimestamp(_) => ApiError::StaleTimestamp,
            AuthError::ReplayedSignature => ApiError::ReplayedSignature,
            AuthError::IdentityStoreUnavailable(_) => ApiError::IdentityUnavailable,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Auth(auth) => auth.into(),
            GatewayError::RateLimited(decision) => ApiError::RateLimited(decision),
            GatewayError::NoPolicy(_) => ApiError::NoPolicy,
            GatewayError::MethodNotAllowed(_) => ApiError::MethodNotAllowed,
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConfigMissing(what) => {
                tracing::error!("Data store misconfigured: missing {}", what);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
                tracing::error!("Data store unreachable");
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<ScopedError> for ApiError {
    fn from(err: ScopedError) -> Self {
        match err {
            ScopedError::Auth(auth) => auth.into(),
            ScopedError::Database(db) => db.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status_code(), Json(self.to_json())).into_response();

        if let ApiError::RateLimited(decision) = &self {
            let headers = response.headers_mut();
            decision.write_headers(headers);
            headers.insert(
                header::RETRY_AFTER,
                HeaderValue::from(decision.retry_after_secs()),
            );
        }

        response
    }
}
