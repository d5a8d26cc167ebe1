use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use crate::auth::CredentialKind;

pub const API_KEY_HEADER: &str = "x-api-key";

/// A raw credential as presented by the caller.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    ApiKey(String),
    SessionCookie(String),
}

impl Credential {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::Bearer(_) => CredentialKind::Bearer,
            Credential::ApiKey(_) => CredentialKind::ApiKey,
            Credential::SessionCookie(_) => CredentialKind::Session,
        }
    }

    pub fn secret(&self) -> &str {
        match self {
            Credential::Bearer(s) | Credential::ApiKey(s) | Credential::SessionCookie(s) => s,
        }
    }

    /// Cache key: SHA-256 over kind and raw value, so raw credentials are
    /// never kept as map keys.
    pub fn cache_key(&self) -> String {
        let tag = match self.kind() {
            CredentialKind::Bearer => "bearer",
            CredentialKind::ApiKey => "api_key",
            CredentialKind::Session => "session",
        };
        let mut hasher = Sha256::new();
        hasher.update(tag.as_bytes());
        hasher.update(b":");
        hasher.update(self.secret().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// Never print raw credentials
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential::{:?}(..)", self.kind())
    }
}

/// All credentials on the request, highest precedence first:
/// bearer token, then API key, then session cookie.
pub fn extract_credentials(headers: &HeaderMap, cookie_name: &str) -> Vec<Credential> {
    let mut found = Vec::with_capacity(3);

    if let Some(token) = bearer_token(headers) {
        found.push(Credential::Bearer(token));
    }
    if let Some(key) = api_key(headers) {
        found.push(Credential::ApiKey(key));
    }
    if let Some(session) = cookie_value(headers, cookie_name) {
        found.push(Credential::SessionCookie(session));
    }

    found
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .or_else(|| auth_str.strip_prefix("bearer "))?
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn api_key(headers: &HeaderMap) -> Option<String> {
    let key = headers.get(API_KEY_HEADER)?.to_str().ok()?.trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Value of the named cookie across every `Cookie` header
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.trim_matches('"').to_string())
}
