//! The outcome of an `authenticate` call.

use crate::error::ErrorKind;
use crate::model::user_record::UserRecord;
use serde::{Deserialize, Serialize};

/// Which cache tier served a request, cheapest first.
///
/// `cache_tier_hit` is always the *highest* (cheapest) tier that served the
/// request — a record filled from L4 and promoted to L1/L2/L3 is reported
/// as `L4` for the call that triggered the fill, and `L1` for every call
/// after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// No tier served the request (the request failed before any lookup).
    None,
    /// In-process secure memory cache.
    L1,
    /// Remote key/value store.
    L2,
    /// Document store.
    L3,
    /// Directory authority.
    L4,
}

/// The result of a single `authenticate` call.
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    /// Whether the credential verified.
    pub success: bool,
    /// The user's profile, present whenever a record was found regardless
    /// of whether the password verified.
    pub user: Option<UserRecord>,
    /// The classified failure, if any.
    pub error_kind: Option<ErrorKind>,
    /// Wall-clock time spent in the authentication pipeline, in milliseconds.
    pub response_time_ms: u64,
    /// The cheapest tier that served the request.
    pub cache_tier_hit: CacheTier,
}

impl AuthenticationResult {
    /// Build a successful result.
    pub fn success(user: UserRecord, response_time_ms: u64, cache_tier_hit: CacheTier) -> Self {
        Self {
            success: true,
            user: Some(user),
            error_kind: None,
            response_time_ms,
            cache_tier_hit,
        }
    }

    /// Build a failed result that still carries the resolved user (e.g.
    /// `InvalidCredentials`, `AccountLocked`).
    pub fn failure_with_user(
        user: UserRecord,
        error_kind: ErrorKind,
        response_time_ms: u64,
        cache_tier_hit: CacheTier,
    ) -> Self {
        Self {
            success: false,
            user: Some(user),
            error_kind: Some(error_kind),
            response_time_ms,
            cache_tier_hit,
        }
    }

    /// Build a failed result with no resolved user (e.g. `UserNotFound`,
    /// `InvalidInput`).
    pub fn failure(error_kind: ErrorKind, response_time_ms: u64) -> Self {
        Self {
            success: false,
            user: None,
            error_kind: Some(error_kind),
            response_time_ms,
            cache_tier_hit: CacheTier::None,
        }
    }

    /// The generic external message, safe to return to a caller.
    pub fn public_message(&self) -> &'static str {
        match self.error_kind {
            Some(kind) => kind.public_message(),
            None => "authenticated",
        }
    }
}
