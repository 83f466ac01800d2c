//! Signing, verification, and key lifecycle for Polis sites.

pub mod keys;
pub mod signing;

pub use keys::SiteKeys;
pub use signing::{
    content_version, decode_public_key, hash_parts, sha256_hex, short_hash, sign_content,
    verify_content,
};
