//! The end-to-end authentication pipeline: validate input, resolve the
//! user through the cache tiers, check lockout, verify the password, and
//! update lockout/attempt bookkeeping.

use crate::auth::password::verify_password;
use crate::cache::distributed::DistributedAuthCache;
use crate::error::ErrorKind;
use crate::model::credential::Credential;
use crate::model::result::{AuthenticationResult, CacheTier};
use crate::model::user_record::{LockoutInfo, UserRecord};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Failed attempts allowed before a lockout is imposed.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;
/// How long a lockout lasts once imposed.
pub const LOCKOUT_DURATION: chrono::Duration = chrono::Duration::minutes(15);

/// Runs the authentication pipeline against a [`DistributedAuthCache`].
pub struct AuthService {
    cache: Arc<DistributedAuthCache>,
}

impl AuthService {
    /// Build a service over the given tier coordinator.
    pub fn new(cache: Arc<DistributedAuthCache>) -> Self {
        Self { cache }
    }

    /// Authenticate a `(username, password)` pair. Never panics; every
    /// failure path — including a malformed username — returns a classified
    /// [`AuthenticationResult`] rather than an `Err`. The only `Err` this
    /// produces is a directory fill that failed after one retry.
    pub async fn authenticate(
        &self,
        username: &str,
        password: impl Into<Vec<u8>>,
    ) -> crate::Result<AuthenticationResult> {
        let started = Instant::now();

        let credential = match Credential::new(username, password) {
            Ok(c) => c,
            Err(e) => return Ok(AuthenticationResult::failure(e.kind(), elapsed_ms(started))),
        };
        let username = credential.username();

        let Some((mut record, tier)) = self.resolve(username).await? else {
            return Ok(AuthenticationResult::failure(
                ErrorKind::UserNotFound,
                elapsed_ms(started),
            ));
        };

        let now = Utc::now();

        if record.is_locked(now) {
            return Ok(AuthenticationResult::failure_with_user(
                record,
                ErrorKind::AccountLocked,
                elapsed_ms(started),
                tier,
            ));
        }

        if !record.is_active() {
            return Ok(AuthenticationResult::failure_with_user(
                record,
                ErrorKind::AccountInactive,
                elapsed_ms(started),
                tier,
            ));
        }

        if record.password_expired(now) {
            return Ok(AuthenticationResult::failure_with_user(
                record,
                ErrorKind::PasswordExpired,
                elapsed_ms(started),
                tier,
            ));
        }

        let verified = verify_password(
            record.hash_algorithm,
            credential.password(),
            &record.salt,
            &record.password_hash,
        );

        if verified {
            record.failed_attempts = 0;
            record.last_success = Some(now);
            record.lockout_info = None;
            self.cache.invalidate(username).await;
            // The refreshed record will be re-filled from the directory on
            // next read; this call only needed to clear stale lockout state
            // eagerly rather than waiting on TTL expiry.
            Ok(AuthenticationResult::success(record, elapsed_ms(started), tier))
        } else {
            record.failed_attempts += 1;
            record.last_failure = Some(now);
            if record.failed_attempts >= MAX_FAILED_ATTEMPTS {
                record.status = crate::model::user_record::UserStatus::Locked;
                record.lockout_info = Some(LockoutInfo {
                    lockout_time: now,
                    unlock_time: now + LOCKOUT_DURATION,
                    reason: "too-many-failures".to_string(),
                    attempt_count: record.failed_attempts,
                    policy_id: None,
                });
            }
            self.cache.invalidate(username).await;
            Ok(AuthenticationResult::failure_with_user(
                record,
                ErrorKind::InvalidCredentials,
                elapsed_ms(started),
                tier,
            ))
        }
    }

    /// Resolve a username through the cache tiers, falling back to a
    /// directory fill on a full miss. A `BackendUnavailable` fill error is
    /// retried exactly once before being surfaced.
    async fn resolve(&self, username: &str) -> crate::Result<Option<(UserRecord, CacheTier)>> {
        if let Some(hit) = self.cache.get(username).await {
            return Ok(Some(hit));
        }

        match self.cache.fill(username).await {
            Ok(Some(record)) => Ok(Some((record, CacheTier::L4))),
            Ok(None) => Ok(None),
            Err(e) if e.kind() == ErrorKind::BackendUnavailable => {
                match self.cache.fill(username).await {
                    Ok(Some(record)) => Ok(Some((record, CacheTier::L4))),
                    Ok(None) => Ok(None),
                    Err(retry_err) => Err(retry_err),
                }
            }
            Err(e) => Err(e),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_duration_matches_policy() {
        assert_eq!(LOCKOUT_DURATION, chrono::Duration::minutes(15));
    }

    #[test]
    fn max_failed_attempts_matches_policy() {
        assert_eq!(MAX_FAILED_ATTEMPTS, 5);
    }

    // `AuthService::authenticate` itself needs a live DistributedAuthCache
    // (which needs a directory pool); covered by the end-to-end integration
    // tests instead of a unit test here, including the
    // empty/whitespace-username -> `InvalidInput` path.
}
