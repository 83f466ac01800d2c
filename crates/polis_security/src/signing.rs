//! Ed25519 signatures and SHA256 content identity.
//!
//! Post and comment versions are `hex(sha256(body))`; detached signatures
//! cover the exact file bytes as stored.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use polis_protocol::{PolisError, Result};

/// Compute SHA256 hash of data.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Content version of an artifact body.
pub fn content_version(body: &str) -> String {
    sha256_hex(body.as_bytes())
}

/// Compute a stable hash from multiple components.
///
/// Components are separated with ASCII Unit Separator (0x1f) to avoid
/// ambiguity.
pub fn hash_parts(parts: &[&str]) -> String {
    const SEP: u8 = 0x1f;
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([SEP]);
    }
    hex::encode(hasher.finalize())
}

/// Short content-derived identifier (first 12 hex chars).
pub fn short_hash(parts: &[&str]) -> String {
    let full = hash_parts(parts);
    full[..12].to_string()
}

/// Sign raw bytes, returning a base64-encoded detached signature.
pub fn sign_content(data: &[u8], key: &SigningKey) -> String {
    BASE64.encode(key.sign(data).to_bytes())
}

/// Verify a base64-encoded detached signature against raw bytes.
pub fn verify_content(data: &[u8], signature_b64: &str, key: &VerifyingKey) -> Result<()> {
    let signature_bytes = BASE64
        .decode(signature_b64.trim())
        .map_err(|_| PolisError::CryptoVerify("signature is not valid base64".into()))?;
    let signature_bytes: [u8; 64] = signature_bytes
        .as_slice()
        .try_into()
        .map_err(|_| PolisError::CryptoVerify("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&signature_bytes);
    key.verify_strict(data, &signature)
        .map_err(|_| PolisError::CryptoVerify("signature does not match content".into()))
}

/// Decode a peer's base64 public key from their manifest.
pub fn decode_public_key(public_key_b64: &str) -> Result<VerifyingKey> {
    let key_bytes = BASE64
        .decode(public_key_b64.trim())
        .map_err(|_| PolisError::CryptoVerify("public key is not valid base64".into()))?;
    let key_bytes: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| PolisError::CryptoVerify("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| PolisError::CryptoVerify("invalid ed25519 public key".into()))
}
