//! Public entry points collaborators call into.

use crate::auth::service::AuthService;
use crate::cache::distributed::{CacheStatistics, DistributedAuthCache};
use crate::error::AuthCacheError;
use crate::metrics::ServiceSnapshot;
use crate::model::result::AuthenticationResult;
use crate::model::user_record::UserRecord;
use std::sync::Arc;

/// The façade collaborators hold onto. Cheap to clone — it's a handle over
/// `Arc`-shared state, not an owner of pool connections.
#[derive(Clone)]
pub struct AuthClient {
    cache: Arc<DistributedAuthCache>,
    service: Arc<AuthService>,
}

impl AuthClient {
    /// Build a client over an already-initialized tier coordinator.
    pub fn new(cache: Arc<DistributedAuthCache>) -> Self {
        let service = Arc::new(AuthService::new(cache.clone()));
        Self { cache, service }
    }

    /// Authenticate a username/password pair. This is the async entry point;
    /// [`AuthClient::authenticate_sync`] wraps this for callers on a
    /// non-async thread.
    pub async fn authenticate_async(
        &self,
        username: &str,
        password: impl Into<Vec<u8>>,
    ) -> crate::Result<AuthenticationResult> {
        self.service.authenticate(username, password).await
    }

    /// Authenticate from a blocking (non-async) context by driving the
    /// current Tokio runtime's handle. Panics if called without an active
    /// runtime — `authenticate_async` is the right entry point from async
    /// code; this one exists for synchronous callers (CLI tools, FFI shims)
    /// that hold a runtime handle but are not themselves `async fn`.
    pub fn authenticate_sync(
        &self,
        username: &str,
        password: impl Into<Vec<u8>>,
    ) -> crate::Result<AuthenticationResult> {
        let username = username.to_string();
        let password = password.into();
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.authenticate_async(&username, password))
        })
    }

    /// Look up a user's cached profile without verifying a password. Does
    /// not trigger a directory fill on a cache miss.
    pub async fn get_user(&self, username: &str) -> Option<UserRecord> {
        self.cache.get(username).await.map(|(record, _tier)| record)
    }

    /// Validate a session token.
    ///
    /// This checks only that `user.is_active()` and that `token` is
    /// non-empty — it does not compare `token` against any session store,
    /// because this cache does not maintain one. A caller that needs true
    /// session revocation must layer that on top; this method validates the
    /// *account*, not the token's authenticity.
    pub fn validate_session(user: &UserRecord, token: &str) -> bool {
        user.is_active() && !token.trim().is_empty()
    }

    /// A snapshot of the tier coordinator's counters.
    pub async fn service_statistics(&self) -> CacheStatistics {
        self.cache.stats()
    }

    /// A point-in-time health snapshot across every pool and the cache
    /// tiers, reduced to one overall [`crate::metrics::Health`] by
    /// [`ServiceSnapshot::overall_health`].
    pub async fn health(&self) -> ServiceSnapshot {
        self.cache.health_snapshot()
    }

    /// Drive the scheduled L1 key-rotation task once. Intended to be called
    /// from a `tokio::time::interval` loop on the scheduled worker pool.
    pub fn rotate_l1_keys(&self) {
        self.cache.rotate_l1_keys();
    }

    /// Drive the scheduled L1 TTL-sweep task once.
    pub fn sweep_l1(&self) {
        self.cache.sweep_l1();
    }

    /// Authenticate many credentials with bounded concurrency. See
    /// [`crate::client::batch`].
    pub async fn authenticate_batch(
        &self,
        credentials: Vec<(String, Vec<u8>)>,
        options: &crate::client::batch::BatchOptions,
    ) -> std::collections::HashMap<String, crate::client::batch::BatchResult> {
        crate::client::batch::authenticate_batch(self, credentials, options).await
    }
}

/// Map an error to the message it is safe to return to an external caller.
pub fn public_message(err: &AuthCacheError) -> &'static str {
    err.kind().public_message()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user_record::{HashAlgorithm, UserStatus, SCHEMA_VERSION};
    use chrono::Utc;
    use std::collections::{HashMap, HashSet};

    fn sample_user() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            schema_version: SCHEMA_VERSION,
            username: "jdoe".into(),
            distinguished_name: "uid=jdoe,dc=example,dc=com".into(),
            employee_id: "E1".into(),
            email: "jdoe@example.com".into(),
            display_name: "Jane Doe".into(),
            department: "Eng".into(),
            region: "US-EAST".into(),
            password_hash: "h".into(),
            salt: "s".into(),
            hash_algorithm: HashAlgorithm::Sha256Salted,
            strength: 3,
            password_expiry: now + chrono::Duration::days(30),
            last_change: now,
            mfa_enabled: false,
            mfa_methods: HashSet::new(),
            mfa_secrets: HashMap::new(),
            status: UserStatus::Active,
            lockout_info: None,
            risk_score: 0,
            failed_attempts: 0,
            last_success: None,
            last_failure: None,
            last_ip: None,
            roles: HashSet::new(),
            groups: HashSet::new(),
            entitlements: HashMap::new(),
            security_clearance: "PUBLIC".into(),
            cache_timestamp: now,
            ttl_seconds: 300,
            access_frequency: 0,
            cache_region: "US-EAST".into(),
        }
    }

    #[test]
    fn validate_session_requires_active_user_and_nonempty_token() {
        let mut user = sample_user();
        assert!(AuthClient::validate_session(&user, "tok"));
        assert!(!AuthClient::validate_session(&user, ""));
        assert!(!AuthClient::validate_session(&user, "   "));
        user.status = UserStatus::Inactive;
        assert!(!AuthClient::validate_session(&user, "tok"));
    }
}
