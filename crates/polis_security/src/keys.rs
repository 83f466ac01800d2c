//! Site keypair lifecycle.
//!
//! Keys live under keys/ as base64-encoded files: private.key holds the
//! 32-byte signing seed, public.key the verifying key. The private key never
//! leaves the site directory.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fs;
use std::path::Path;

use polis_protocol::{PolisError, Result, SitePaths};

/// Loaded site keypair.
#[derive(Clone)]
pub struct SiteKeys {
    signing: SigningKey,
}

impl std::fmt::Debug for SiteKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material through Debug.
        f.debug_struct("SiteKeys").finish_non_exhaustive()
    }
}

impl SiteKeys {
    /// Generate a fresh keypair and write both files.
    pub fn generate(paths: &SitePaths) -> Result<Self> {
        let signing = SigningKey::generate(&mut OsRng);
        let keys = Self { signing };
        keys.save(paths)?;
        Ok(keys)
    }

    /// Load the keypair from keys/private.key, checking consistency with
    /// keys/public.key when present.
    pub fn load(paths: &SitePaths) -> Result<Self> {
        let private_path = paths.private_key();
        if !private_path.exists() {
            return Err(PolisError::not_configured(format!(
                "missing private key at {}",
                private_path.display()
            )));
        }
        let signing = read_signing_key(&private_path)?;
        let public_path = paths.public_key();
        if public_path.exists() {
            let stored = read_verifying_key(&public_path)?;
            if stored != signing.verifying_key() {
                return Err(PolisError::CryptoVerify(
                    "public.key does not match private.key".into(),
                ));
            }
        }
        Ok(Self { signing })
    }

    fn save(&self, paths: &SitePaths) -> Result<()> {
        fs::create_dir_all(paths.keys_dir())?;
        fs::write(
            paths.private_key(),
            BASE64.encode(self.signing.to_bytes()) + "\n",
        )?;
        fs::write(paths.public_key(), self.public_key_b64() + "\n")?;
        Ok(())
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Base64 public key as published in .well-known/polis.
    pub fn public_key_b64(&self) -> String {
        BASE64.encode(self.signing.verifying_key().to_bytes())
    }
}

fn read_signing_key(path: &Path) -> Result<SigningKey> {
    let raw = fs::read_to_string(path)?;
    let bytes = BASE64
        .decode(raw.trim())
        .map_err(|_| PolisError::CryptoVerify(format!("{}: not valid base64", path.display())))?;
    let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        PolisError::CryptoVerify(format!("{}: key must be 32 bytes", path.display()))
    })?;
    Ok(SigningKey::from_bytes(&bytes))
}

fn read_verifying_key(path: &Path) -> Result<VerifyingKey> {
    let raw = fs::read_to_string(path)?;
    crate::signing::decode_public_key(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_and_load() {
        let temp = TempDir::new().unwrap();
        let paths = SitePaths::new(temp.path());
        let generated = SiteKeys::generate(&paths).unwrap();
        let loaded = SiteKeys::load(&paths).unwrap();
        assert_eq!(generated.public_key_b64(), loaded.public_key_b64());
        assert!(paths.private_key().exists());
        assert!(paths.public_key().exists());
    }

    #[test]
    fn test_load_missing_key_is_not_configured() {
        let temp = TempDir::new().unwrap();
        let paths = SitePaths::new(temp.path());
        let err = SiteKeys::load(&paths).unwrap_err();
        assert!(matches!(err, PolisError::NotConfigured(_)));
    }

    #[test]
    fn test_load_rejects_mismatched_pair() {
        let temp = TempDir::new().unwrap();
        let paths = SitePaths::new(temp.path());
        SiteKeys::generate(&paths).unwrap();
        let other = SigningKey::from_bytes(&[3u8; 32]);
        fs::write(
            paths.public_key(),
            BASE64.encode(other.verifying_key().to_bytes()),
        )
        .unwrap();
        let err = SiteKeys::load(&paths).unwrap_err();
        assert!(matches!(err, PolisError::CryptoVerify(_)));
    }

    #[test]
    fn test_load_rejects_corrupt_private_key() {
        let temp = TempDir::new().unwrap();
        let paths = SitePaths::new(temp.path());
        fs::create_dir_all(paths.keys_dir()).unwrap();
        fs::write(paths.private_key(), "not base64!!!").unwrap();
        assert!(SiteKeys::load(&paths).is_err());
    }
}
