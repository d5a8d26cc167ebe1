//! Signed device payloads: canonical JSON, HMAC-SHA256 and timestamp
//! freshness, with an optional seen-signature guard.

pub mod canonical;
pub mod envelope;
pub mod freshness;
pub mod replay;
pub mod sign;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthError;
use crate::config::SignatureConfig;

pub use canonical::canonicalize;
pub use envelope::{SignedEnvelope, TIMESTAMP_FIELD};
pub use freshness::{parse_timestamp, verify_freshness, verify_freshness_at};
pub use replay::ReplayGuard;
pub use sign::{create_signature, verify};

/// A payload whose signature and timestamp checked out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedPayload {
    pub payload: Value,
    pub timestamp: Option<DateTime<Utc>>,
    pub device_class: Option<String>,
}

pub struct SignatureVerifier {
    default_secret: Option<String>,
    device_secrets: HashMap<String, String>,
    window_ms: u64,
    require_timestamp: bool,
    replay: Option<Arc<ReplayGuard>>,
}

impl SignatureVerifier {
    pub fn from_config(config: &SignatureConfig) -> Self {
        let replay = config.replay_protection.then(|| {
            let span = std::time::Duration::from_millis(config.freshness_window_ms.saturating_mul(2));
            Arc::new(ReplayGuard::new(span))
        });

        Self {
            default_secret: Some(config.secret.clone()).filter(|s| !s.is_empty()),
            device_secrets: config.device_secrets.clone(),
            window_ms: config.freshness_window_ms,
            require_timestamp: config.require_timestamp,
            replay,
        }
    }

    pub fn replay_guard(&self) -> Option<&Arc<ReplayGuard>> {
        self.replay.as_ref()
    }

    /// Secret for a device class, falling back to the deployment secret.
    pub fn secret_for(&self, device_class: Option<&str>) -> Option<&str> {
        device_class
            .and_then(|class| self.device_secrets.get(class))
            .or(self.default_secret.as_ref())
            .map(String::as_str)
    }

    pub async fn verify_body(
        &self,
        body: &[u8],
        device_class: Option<&str>,
    ) -> Result<VerifiedPayload, AuthError> {
        let envelope = SignedEnvelope::from_slice(body)?;
        self.verify_envelope(&envelope, device_class).await
    }

    pub async fn verify_envelope(
        &self,
        envelope: &SignedEnvelope,
        device_class: Option<&str>,
    ) -> Result<VerifiedPayload, AuthError> {
        self.verify_envelope_at(envelope, device_class, Utc::now(), Instant::now())
            .await
    }

    /// Shape, then signature, then freshness, then replay. The signature is
    /// checked before the timestamp so unsigned input learns nothing about
    /// the clock.
    pub async fn verify_envelope_at(
        &self,
        envelope: &SignedEnvelope,
        device_class: Option<&str>,
        now: DateTime<Utc>,
        instant: Instant,
    ) -> Result<VerifiedPayload, AuthError> {
        let payload = envelope.signed_payload()?;
        envelope.check_signature_format()?;

        let timestamp = match payload.get(TIMESTAMP_FIELD) {
            Some(raw) => Some(
                parse_timestamp(raw).ok_or_else(|| AuthError::malformed("unparsable timestamp"))?,
            ),
            None if self.require_timestamp => {
                return Err(AuthError::malformed("missing timestamp"));
            }
            None => None,
        };

        let secret = self.secret_for(device_class).ok_or_else(|| {
            tracing::error!(
                "No signing secret configured for device class {:?}",
                device_class
            );
            AuthError::invalid_signature("no signing secret configured")
        })?;

        if !verify(&payload, &envelope.signature, secret) {
            tracing::warn!("Signature mismatch for device class {:?}", device_class);
            return Err(AuthError::invalid_signature("signature mismatch"));
        }

        if let Some(ts) = timestamp {
            if !verify_freshness_at(ts, freshness::window(self.window_ms), now) {
                tracing::warn!("Stale signed payload: timestamp {} at {}", ts.to_rfc3339(), now.to_rfc3339());
                return Err(AuthError::stale(format!("timestamp {} outside window", ts.to_rfc3339())));
            }
        }

        if let Some(guard) = &self.replay {
            if !guard.remember(&envelope.signature, instant).await {
                tracing::warn!("Replayed signature for device class {:?}", device_class);
                return Err(AuthError::ReplayedSignature);
            }
        }

        Ok(VerifiedPayload {
            payload,
            timestamp,
            device_class: device_class.map(str::to_string),
        })
    }
}
