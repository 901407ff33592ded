//! Crate-wide error taxonomy.
//!
//! Errors are modeled as an explicit [`ErrorKind`] rather than a hierarchy of
//! exception types: callers match on the kind, never on a type name, which
//! keeps the façade's anti-enumeration mapping (`InvalidCredentials` and
//! `UserNotFound` produce the same external message) a one-line `match`.

use thiserror::Error;

/// The kind of failure an operation produced.
///
/// Kinds carry no payload beyond what is named here; context (which backend,
/// which key) is carried by [`AuthCacheError`]'s `context` field instead, so
/// that matching on `kind()` never needs to look inside a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty, oversize, or forbidden-pattern input.
    InvalidInput,
    /// No record found in any cache tier or the directory.
    UserNotFound,
    /// User present, password did not verify.
    InvalidCredentials,
    /// Lockout currently in effect; no password comparison was performed.
    AccountLocked,
    /// Account status is not active.
    AccountInactive,
    /// The user's password has expired.
    PasswordExpired,
    /// Transient pool/network/TLS failure, surfaced after one retry.
    BackendUnavailable,
    /// Missing or malformed certificate/keystore/URL configuration.
    ConfigError,
    /// Unclassified internal error.
    Internal,
}

impl ErrorKind {
    /// The generic external message safe to return to a caller.
    ///
    /// `InvalidCredentials` and `UserNotFound` deliberately share a message
    /// so a caller cannot distinguish "wrong password" from "no such user".
    pub fn public_message(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid request",
            ErrorKind::UserNotFound | ErrorKind::InvalidCredentials => {
                "authentication failed"
            }
            ErrorKind::AccountLocked => "account locked",
            ErrorKind::AccountInactive => "account inactive",
            ErrorKind::PasswordExpired => "password expired",
            ErrorKind::BackendUnavailable => "service temporarily unavailable",
            ErrorKind::ConfigError => "service misconfigured",
            ErrorKind::Internal => "internal error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::UserNotFound => "UserNotFound",
            ErrorKind::InvalidCredentials => "InvalidCredentials",
            ErrorKind::AccountLocked => "AccountLocked",
            ErrorKind::AccountInactive => "AccountInactive",
            ErrorKind::PasswordExpired => "PasswordExpired",
            ErrorKind::BackendUnavailable => "BackendUnavailable",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::Internal => "Internal",
        };
        write!(f, "{s}")
    }
}

/// The crate's error type: an [`ErrorKind`] plus sanitized context.
///
/// `context` must never contain a password, password hash, or keystore
/// password — callers constructing this error are responsible for
/// sanitizing any value that came from user input or a secret store.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {context}")]
pub struct AuthCacheError {
    kind: ErrorKind,
    context: String,
}

impl AuthCacheError {
    /// Build an error of the given kind with a context message.
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
        }
    }

    /// The classified kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Shorthand for `ErrorKind::InvalidInput`.
    pub fn invalid_input(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, context)
    }

    /// Shorthand for `ErrorKind::UserNotFound`.
    pub fn user_not_found(username: &str) -> Self {
        Self::new(ErrorKind::UserNotFound, format!("no record for {username}"))
    }

    /// Shorthand for `ErrorKind::InvalidCredentials`.
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorKind::InvalidCredentials, "password did not verify")
    }

    /// Shorthand for `ErrorKind::AccountLocked`.
    pub fn account_locked(unlock_time: chrono::DateTime<chrono::Utc>) -> Self {
        Self::new(ErrorKind::AccountLocked, format!("locked until {unlock_time}"))
    }

    /// Shorthand for `ErrorKind::AccountInactive`.
    pub fn account_inactive() -> Self {
        Self::new(ErrorKind::AccountInactive, "status is not active")
    }

    /// Shorthand for `ErrorKind::PasswordExpired`.
    pub fn password_expired() -> Self {
        Self::new(ErrorKind::PasswordExpired, "password_expiry has passed")
    }

    /// Shorthand for `ErrorKind::BackendUnavailable`.
    pub fn backend_unavailable(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendUnavailable, context)
    }

    /// Shorthand for `ErrorKind::ConfigError`.
    pub fn config_error(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigError, context)
    }

    /// Shorthand for `ErrorKind::Internal`.
    pub fn internal(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, context)
    }
}

/// The crate's `Result` alias.
pub type Result<T> = std::result::Result<T, AuthCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_not_found_and_invalid_credentials_share_public_message() {
        let a = AuthCacheError::user_not_found("jdoe");
        let b = AuthCacheError::invalid_credentials();
        assert_eq!(a.kind().public_message(), b.kind().public_message());
    }

    #[test]
    fn display_includes_kind_and_context() {
        let e = AuthCacheError::config_error("missing keystore path");
        let s = e.to_string();
        assert!(s.contains("ConfigError"));
        assert!(s.contains("missing keystore path"));
    }
}
