//! Cookie signing keys
//!
//! Ordered, non-empty list of HMAC-SHA256 keys. The first key signs new
//! cookies; every key is accepted when verifying, so a new key can be put
//! in front without logging anybody out.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

struct SigningKey(Vec<u8>);

/// Process-wide key set, built once at startup and shared read-only
pub struct SigningKeySet {
    keys: Vec<SigningKey>,
}

impl SigningKeySet {
    /// Build a key set, newest key first
    ///
    /// # Errors
    /// Returns `AppError::Config` when no key is given or a key is empty
    pub fn new<I, K>(keys: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let keys: Vec<SigningKey> = keys
            .into_iter()
            .map(|key| SigningKey(key.as_ref().to_vec()))
            .collect();

        if keys.is_empty() {
            return Err(AppError::Config(
                "at least one cookie signing key is required".to_string(),
            ));
        }
        if keys.iter().any(|key| key.0.is_empty()) {
            return Err(AppError::Config(
                "cookie signing keys must not be empty".to_string(),
            ));
        }

        Ok(Self { keys })
    }

    /// Sign `message` with the first key
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, AppError> {
        let signer = &self.keys[0];
        let mut mac = HmacSha256::new_from_slice(&signer.0)
            .map_err(|e| AppError::Encryption(e.to_string()))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Index of the first key whose signature over `message` matches
    ///
    /// Comparison is constant-time per key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Option<usize> {
        self.keys.iter().position(|key| {
            HmacSha256::new_from_slice(&key.0)
                .map(|mut mac| {
                    mac.update(message);
                    mac.verify_slice(signature).is_ok()
                })
                .unwrap_or(false)
        })
    }
}

impl std::fmt::Debug for SigningKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeySet")
            .field("keys", &format_args!("[{} redacted]", self.keys.len()))
            .finish()
    }
}
