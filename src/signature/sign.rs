use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::canonical::canonicalize;

type HmacSha256 = Hmac<Sha256>;

fn mac_bytes(message: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Hex HMAC-SHA256 of the canonical form of `payload`.
pub fn create_signature(payload: &Value, secret: &str) -> String {
    hex::encode(mac_bytes(canonicalize(payload).as_bytes(), secret.as_bytes()))
}

/// Whether `signature` (hex, either case) is the HMAC of `payload`.
///
/// Compared in constant time over the decoded bytes.
pub fn verify(payload: &Value, signature: &str, secret: &str) -> bool {
    let presented = match hex::decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let expected = mac_bytes(canonicalize(payload).as_bytes(), secret.as_bytes());
    expected.as_slice().ct_eq(presented.as_slice()).into()
}
