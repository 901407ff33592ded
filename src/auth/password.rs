//! Dispatches password verification to the algorithm a stored hash was
//! produced with, always via a constant-time comparison.

use crate::crypto::kdf::{KdfProvider, Pbkdf2Config};
use crate::model::user_record::HashAlgorithm;
use ring::constant_time;
use sha2::{Digest, Sha256};

/// The fixed PBKDF2-HMAC-SHA256 cost used for credential verification. This
/// is deliberately lower than [`Pbkdf2Config::default`]'s 600,000 (tuned for
/// a general-purpose key-derivation use case); 50,000 is the cost this
/// contract's accounts were actually hashed at.
pub const PBKDF2_ITERATIONS: u32 = 50_000;

fn pbkdf2_config() -> Pbkdf2Config {
    Pbkdf2Config {
        iterations: PBKDF2_ITERATIONS,
        key_length: 32,
    }
}

/// Verify `password` against `stored_hash`/`salt` using `algorithm`.
/// Returns `false` (never panics, never errors) on any malformed input —
/// a bad hex salt or truncated hash is a verification failure, not a crash.
pub fn verify_password(
    algorithm: HashAlgorithm,
    password: &[u8],
    salt: &str,
    stored_hash: &str,
) -> bool {
    match algorithm {
        HashAlgorithm::Pbkdf2Sha256 => verify_pbkdf2_sha256(password, salt, stored_hash),
        HashAlgorithm::Bcrypt => verify_bcrypt(password, stored_hash),
        HashAlgorithm::Sha256Salted => verify_sha256_salted(password, salt, stored_hash),
    }
}

fn verify_pbkdf2_sha256(password: &[u8], salt: &str, stored_hash: &str) -> bool {
    let Ok(salt_bytes) = hex::decode(salt) else {
        return false;
    };
    let Ok(expected) = hex::decode(stored_hash) else {
        return false;
    };
    let Ok(derived) = KdfProvider::derive_pbkdf2_sha256(password, &salt_bytes, &pbkdf2_config())
    else {
        return false;
    };
    constant_time::verify_slices_are_equal(derived.as_bytes(), &expected).is_ok()
}

fn verify_bcrypt(password: &[u8], stored_hash: &str) -> bool {
    let Ok(password_str) = std::str::from_utf8(password) else {
        return false;
    };
    // bcrypt::verify already runs in constant time internally; it embeds the
    // cost and salt in `stored_hash` itself.
    bcrypt::verify(password_str, stored_hash).unwrap_or(false)
}

fn verify_sha256_salted(password: &[u8], salt: &str, stored_hash: &str) -> bool {
    let Ok(expected) = hex::decode(stored_hash) else {
        return false;
    };
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password);
    let digest = hasher.finalize();
    constant_time::verify_slices_are_equal(&digest, &expected).is_ok()
}
