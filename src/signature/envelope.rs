use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::AuthError;

pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Wire form of a signed device request:
/// `{ "payload": {...}, "signature": "<hex>", "timestamp"?: ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub payload: Map<String, Value>,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl SignedEnvelope {
    /// Parse a request body. Any shape problem is `MalformedPayload`.
    pub fn from_slice(body: &[u8]) -> Result<Self, AuthError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AuthError::malformed(format!("body is not JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, AuthError> {
        let mut object = match value {
            Value::Object(object) => object,
            _ => return Err(AuthError::malformed("envelope must be a JSON object")),
        };

        let payload = match object.remove("payload") {
            Some(Value::Object(payload)) => payload,
            Some(_) => return Err(AuthError::malformed("payload must be an object")),
            None => return Err(AuthError::malformed("missing payload")),
        };

        let signature = match object.remove("signature") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(_) => return Err(AuthError::malformed("signature must be a non-empty string")),
            None => return Err(AuthError::malformed("missing signature")),
        };

        let timestamp = match object.remove(TIMESTAMP_FIELD) {
            None | Some(Value::Null) => None,
            Some(ts) => Some(ts),
        };

        Ok(Self {
            payload,
            signature,
            timestamp,
        })
    }

    /// The object that was signed. An envelope-level timestamp is folded
    /// into the payload so the signature always covers it.
    pub fn signed_payload(&self) -> Result<Value, AuthError> {
        let mut payload = self.payload.clone();

        if let Some(ts) = &self.timestamp {
            match payload.get(TIMESTAMP_FIELD) {
                Some(existing) if existing != ts => {
                    return Err(AuthError::malformed("conflicting timestamps"));
                }
                Some(_) => {}
                None => {
                    payload.insert(TIMESTAMP_FIELD.to_string(), ts.clone());
                }
            }
        }

        Ok(Value::Object(payload))
    }

    /// Well-formed hex HMAC-SHA256: 64 hex digits.
    pub fn check_signature_format(&self) -> Result<(), AuthError> {
        if self.signature.len() == 64 && self.signature.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(())
        } else {
            Err(AuthError::malformed("signature must be 64 hex characters"))
        }
    }
}
