//! The `(username, password)` pair submitted for authentication.

use crate::error::AuthCacheError;
use zeroize::Zeroizing;

/// Maximum accepted username length, in bytes.
pub const MAX_USERNAME_LEN: usize = 256;

/// A username/password pair awaiting verification.
///
/// `password` is a [`Zeroizing`] buffer: it is wiped on every exit path
/// (normal return, early return, or panic unwind) rather than relying on an
/// explicit `clear()` call at the end of the happy path.
pub struct Credential {
    username: String,
    password: Zeroizing<Vec<u8>>,
}

impl Credential {
    /// Build a credential, rejecting empty or oversize usernames.
    ///
    /// Whitespace-only usernames are also rejected; password bytes are
    /// accepted as-is (an empty password is a valid, if certain-to-fail,
    /// input — it still needs to reach the lockout/attempt-counting logic).
    pub fn new(username: impl Into<String>, password: impl Into<Vec<u8>>) -> crate::Result<Self> {
        let username = username.into();
        let trimmed = username.trim();
        if trimmed.is_empty() {
            return Err(AuthCacheError::invalid_input("username is empty"));
        }
        if username.len() > MAX_USERNAME_LEN {
            return Err(AuthCacheError::invalid_input(format!(
                "username exceeds {MAX_USERNAME_LEN} bytes"
            )));
        }
        Ok(Self {
            username,
            password: Zeroizing::new(password.into()),
        })
    }

    /// The username, as submitted.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The raw password bytes.
    pub fn password(&self) -> &[u8] {
        &self.password
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_username() {
        assert!(Credential::new("", "x").is_err());
        assert!(Credential::new("   ", "x").is_err());
    }

    #[test]
    fn rejects_oversize_username() {
        let long = "a".repeat(MAX_USERNAME_LEN + 1);
        assert!(Credential::new(long, "x").is_err());
    }

    #[test]
    fn accepts_well_formed_credential() {
        let c = Credential::new("jdoe", "hunter2").unwrap();
        assert_eq!(c.username(), "jdoe");
        assert_eq!(c.password(), b"hunter2");
    }
}
