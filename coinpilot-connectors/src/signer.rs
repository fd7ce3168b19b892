//! Kraken request signing.
//!
//! ```text
//! postdata  = urlencode(body)
//! message   = path ‖ SHA256(nonce ‖ postdata)
//! API-Sign  = base64(HMAC-SHA512(base64_decode(secret), message))
//! ```
//!
//! Signing is a pure function of `(path, body, secret)`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

/// Name of the body field carrying the nonce.
pub const NONCE_FIELD: &str = "nonce";

/// Errors raised while signing. Both indicate a programming or
/// configuration mistake, never a transient condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// Private key is not valid base64 (or decodes to nothing)
    #[error("API secret is not valid base64: {0}")]
    InvalidSecret(String),

    /// Body has no nonce field
    #[error("Request body has no 'nonce' field")]
    MissingNonce,
}

/// Form-urlencode the body, preserving field order.
///
/// The result is both the signed postdata and the bytes sent on the wire.
pub fn encode_body(body: &[(&str, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in body {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Compute the `API-Sign` header value for a private request.
///
/// # Arguments
///
/// * `path` - URI path only (e.g., "/0/private/AddOrder")
/// * `body` - form fields, including `nonce`
/// * `secret` - base64-encoded private key
///
/// # Errors
///
/// `SignerError::InvalidSecret` if `secret` does not decode,
/// `SignerError::MissingNonce` if `body` lacks a nonce.
pub fn sign(path: &str, body: &[(&str, String)], secret: &str) -> Result<String, SignerError> {
    let nonce = body
        .iter()
        .find(|(key, _)| *key == NONCE_FIELD)
        .map(|(_, value)| value.as_str())
        .ok_or(SignerError::MissingNonce)?;

    let key = STANDARD
        .decode(secret)
        .map_err(|e| SignerError::InvalidSecret(e.to_string()))?;
    if key.is_empty() {
        return Err(SignerError::InvalidSecret("decoded key is empty".to_string()));
    }

    let postdata = encode_body(body);

    let mut hasher = Sha256::new();
    hasher.update(nonce.as_bytes());
    hasher.update(postdata.as_bytes());
    let inner = hasher.finalize();

    let mut mac = HmacSha512::new_from_slice(&key)
        .map_err(|e| SignerError::InvalidSecret(format!("HMAC error: {}", e)))?;
    mac.update(path.as_bytes());
    mac.update(&inner);

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

// =============================================================================
// Tests
// =============================================================================
