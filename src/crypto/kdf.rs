//! # Key Derivation Functions
//!
//! Password-Based Key Derivation Function 2 (RFC 2898), used by
//! `auth::password` to verify PBKDF2-hashed credentials.
//!
//! ## Security Considerations
//!
//! - All derived keys are zeroized on drop
//! - Always use cryptographically secure random salts

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;
use thiserror::Error;

/// KDF-specific errors
#[derive(Error, Debug)]
pub enum KdfError {
    /// Invalid parameter for KDF
    #[error("Invalid KDF parameter: {0}")]
    InvalidParameter(String),

    /// Key derivation failed
    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    /// Output length too short or too long
    #[error("Invalid output length: {0}")]
    InvalidLength(String),

    /// Salt too short
    #[error("Salt too short: minimum {0} bytes required")]
    SaltTooShort(usize),
}

pub type KdfResult<T> = Result<T, KdfError>;

/// Derived key material that is zeroized on drop
#[derive(Clone)]
pub struct DerivedKey {
    #[zeroize(skip)]
    algorithm: String,
    key_material: Vec<u8>,
}

impl DerivedKey {
    /// Create a new derived key
    pub fn new(algorithm: String, key_material: Vec<u8>) -> Self {
        Self {
            algorithm,
            key_material,
        }
    }

    /// Get the key material (use with caution)
    pub fn as_bytes(&self) -> &[u8] {
        &self.key_material
    }

    /// Get the algorithm used
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Get the key length in bytes
    pub fn len(&self) -> usize {
        self.key_material.len()
    }

    /// Check if key is empty
    pub fn is_empty(&self) -> bool {
        self.key_material.is_empty()
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("algorithm", &self.algorithm)
            .field("length", &self.key_material.len())
            .field("key_material", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 configuration
#[derive(Debug, Clone)]
pub struct Pbkdf2Config {
    /// Number of iterations (recommend 600,000+ for SHA-256)
    pub iterations: u32,
    /// Output key length in bytes
    pub key_length: usize,
}

impl Default for Pbkdf2Config {
    fn default() -> Self {
        Self {
            iterations: 600_000, // OWASP recommendation for 2024+
            key_length: 32,
        }
    }
}

/// Key Derivation Function provider
pub struct KdfProvider;

impl KdfProvider {
    /// Derive key using PBKDF2-HMAC-SHA256
    ///
    /// # Arguments
    ///
    /// * `password` - The password or input key material
    /// * `salt` - Salt value (minimum 16 bytes recommended)
    /// * `config` - PBKDF2 configuration
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use authcache::crypto::kdf::{KdfProvider, Pbkdf2Config};
    ///
    /// let password = b"correct horse battery staple";
    /// let salt = b"random_salt_value_16_bytes";
    /// let config = Pbkdf2Config::default();
    ///
    /// let key = KdfProvider::derive_pbkdf2_sha256(password, salt, &config)?;
    /// ```
    pub fn derive_pbkdf2_sha256(
        password: &[u8],
        salt: &[u8],
        config: &Pbkdf2Config,
    ) -> KdfResult<DerivedKey> {
        if salt.len() < 16 {
            return Err(KdfError::SaltTooShort(16));
        }

        let mut key_material = vec![0u8; config.key_length];
        pbkdf2_hmac::<Sha256>(password, salt, config.iterations, &mut key_material);

        Ok(DerivedKey::new("PBKDF2-SHA256".to_string(), key_material))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pbkdf2_sha256() {
        let password = b"test_password";
        let salt = b"test_salt_16byte";
        let config = Pbkdf2Config {
            iterations: 1000,
            key_length: 32,
        };

        let key = KdfProvider::derive_pbkdf2_sha256(password, salt, &config).unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(key.algorithm(), "PBKDF2-SHA256");
    }

    #[test]
    fn test_pbkdf2_deterministic() {
        let password = b"test_password";
        let salt = b"test_salt_16byte";
        let config = Pbkdf2Config::default();

        let key1 = KdfProvider::derive_pbkdf2_sha256(password, salt, &config).unwrap();
        let key2 = KdfProvider::derive_pbkdf2_sha256(password, salt, &config).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_pbkdf2_salt_too_short() {
        let password = b"test_password";
        let salt = b"short";
        let config = Pbkdf2Config::default();

        let result = KdfProvider::derive_pbkdf2_sha256(password, salt, &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_derived_key_debug() {
        let key = DerivedKey::new("TEST".to_string(), vec![1, 2, 3, 4]);
        let debug_str = format!("{:?}", key);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("1, 2, 3, 4"));
    }
}
