//! The cacheable user profile plus its lockout, TTL, and derived-risk metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Schema version stamped onto every serialized `UserRecord` that crosses a
/// process boundary (L2/L3 payloads). Deserializing an unknown version is
/// refused rather than attempted, per the crate's versioning policy.
pub const SCHEMA_VERSION: u32 = 1;

/// The password hashing algorithm a record's `password_hash` was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// PBKDF2-HMAC-SHA256, 50,000 iterations, 32-byte output.
    Pbkdf2Sha256,
    /// bcrypt, cost embedded in the stored hash.
    Bcrypt,
    /// SHA-256 of `salt || password`.
    Sha256Salted,
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Eligible to authenticate.
    Active,
    /// Account is disabled by an administrator, not by lockout.
    Inactive,
    /// Locked by the failed-attempt policy; see `lockout_info`.
    Locked,
    /// Permanently disabled.
    Disabled,
}

/// A risk tier derived from `risk_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// `risk_score <= 20`.
    Low,
    /// `20 < risk_score <= 50`.
    Medium,
    /// `50 < risk_score <= 80`.
    High,
    /// `risk_score > 80`.
    Critical,
}

/// Lockout state for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutInfo {
    /// When the lockout was imposed.
    pub lockout_time: DateTime<Utc>,
    /// When the lockout lifts.
    pub unlock_time: DateTime<Utc>,
    /// Why the lockout was imposed (e.g. `"too-many-failures"`).
    pub reason: String,
    /// How many failed attempts triggered this lockout.
    pub attempt_count: u32,
    /// Identifier of the policy that produced this lockout, if any.
    pub policy_id: Option<String>,
}

impl LockoutInfo {
    /// `true` while `now < unlock_time`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        now < self.unlock_time
    }
}

/// A cacheable user profile.
///
/// Sensitive fields (`password_hash`, `salt`, MFA `secrets`) are present on
/// this struct because the distributed cache encrypts the *entire*
/// serialized record (via the L1 secure memory cache's cipher) before it is
/// written to L2 or L3 — the record never crosses a process boundary in the
/// clear. [`UserRecord::clear_sensitive`] must still be called before any
/// representation is handed to a collaborator that does not perform that
/// encryption (logging, metrics, or a REST surface built atop this crate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Version of this struct's shape; unknown versions are refused on read.
    pub schema_version: u32,

    // Identity
    /// Login identifier.
    pub username: String,
    /// Full distinguished name as returned by the directory.
    pub distinguished_name: String,
    /// Employee or personnel identifier.
    pub employee_id: String,
    /// Email address.
    pub email: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Organizational department.
    pub department: String,
    /// Region this user has been mapped to.
    pub region: String,

    // Authentication material
    /// The stored password hash.
    pub password_hash: String,
    /// The salt used to produce `password_hash`.
    pub salt: String,
    /// Which algorithm `password_hash` was produced with.
    pub hash_algorithm: HashAlgorithm,
    /// Password strength score, `1..=5`.
    pub strength: u8,
    /// When the current password expires.
    pub password_expiry: DateTime<Utc>,
    /// When the current password was last changed.
    pub last_change: DateTime<Utc>,

    // MFA
    /// Whether MFA is enabled for this account.
    pub mfa_enabled: bool,
    /// Enabled MFA methods (e.g. `"totp"`, `"webauthn"`).
    pub mfa_methods: HashSet<String>,
    /// MFA secrets. Never written to any wire representation; see
    /// [`UserRecord::clear_sensitive`].
    pub mfa_secrets: HashMap<String, String>,

    // Status
    /// Current account status.
    pub status: UserStatus,
    /// Present while a lockout is in effect (or was, until it expires).
    pub lockout_info: Option<LockoutInfo>,
    /// Risk score, `0..=100`. Producer is unspecified; see module docs.
    pub risk_score: u8,
    /// Consecutive failed login attempts since the last success.
    pub failed_attempts: u32,
    /// Timestamp of the last successful login.
    pub last_success: Option<DateTime<Utc>>,
    /// Timestamp of the last failed login.
    pub last_failure: Option<DateTime<Utc>>,
    /// Source IP of the last login attempt.
    pub last_ip: Option<String>,

    // Authorization
    /// Role names granted to this user.
    pub roles: HashSet<String>,
    /// Group names this user belongs to.
    pub groups: HashSet<String>,
    /// Resource -> allowed actions.
    pub entitlements: HashMap<String, HashSet<String>>,

    /// Clearance level, used by `requires_mfa`. `"PUBLIC"` never requires MFA
    /// on its own.
    pub security_clearance: String,

    // Cache metadata
    /// When this record was cached.
    pub cache_timestamp: DateTime<Utc>,
    /// How long the cached copy remains valid.
    pub ttl_seconds: u64,
    /// Number of times this record has been read from any tier.
    pub access_frequency: u64,
    /// Region the cached copy currently lives in.
    pub cache_region: String,
}

impl UserRecord {
    /// Default TTL applied when a record does not specify one, in seconds.
    pub const DEFAULT_TTL_SECONDS: u64 = 300;

    /// `true` when a lockout is currently in effect.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, UserStatus::Locked)
            && self
                .lockout_info
                .as_ref()
                .map(|l| l.is_locked(now))
                .unwrap_or(false)
    }

    /// `true` when the account is eligible to authenticate.
    pub fn is_active(&self) -> bool {
        matches!(self.status, UserStatus::Active)
    }

    /// `true` when `password_expiry` has passed.
    pub fn password_expired(&self, now: DateTime<Utc>) -> bool {
        self.password_expiry < now
    }

    /// `true` when `cache_timestamp + ttl_seconds < now` or the password has
    /// expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let cache_deadline = self.cache_timestamp + chrono::Duration::seconds(self.ttl_seconds as i64);
        cache_deadline < now || self.password_expired(now)
    }

    /// Risk tier derived from `risk_score`.
    pub fn risk_level(&self) -> RiskLevel {
        match self.risk_score {
            0..=20 => RiskLevel::Low,
            21..=50 => RiskLevel::Medium,
            51..=80 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    /// `true` when MFA is enabled, risk is high, or clearance is above public.
    pub fn requires_mfa(&self) -> bool {
        self.mfa_enabled || self.risk_score > 50 || self.security_clearance != "PUBLIC"
    }

    /// Zero every secret-bearing field in place. Must be called before this
    /// record is handed to any collaborator that does not itself re-encrypt
    /// it (the distributed cache's L2/L3 writers re-encrypt, so they call
    /// this only on the plaintext copy they keep after encrypting, never on
    /// the one they send over the wire).
    pub fn clear_sensitive(&mut self) {
        self.password_hash.clear();
        self.salt.clear();
        self.mfa_secrets.clear();
    }

    /// The effective TTL, falling back to [`UserRecord::DEFAULT_TTL_SECONDS`].
    pub fn effective_ttl(&self) -> u64 {
        if self.ttl_seconds == 0 {
            Self::DEFAULT_TTL_SECONDS
        } else {
            self.ttl_seconds
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> UserRecord {
        UserRecord {
            schema_version: SCHEMA_VERSION,
            username: "jdoe".into(),
            distinguished_name: "uid=jdoe,ou=Engineering,dc=example,dc=com".into(),
            employee_id: "E100".into(),
            email: "jdoe@example.com".into(),
            display_name: "Jane Doe".into(),
            department: "Engineering".into(),
            region: "US-EAST".into(),
            password_hash: "hash".into(),
            salt: "salt".into(),
            hash_algorithm: HashAlgorithm::Pbkdf2Sha256,
            strength: 3,
            password_expiry: now + chrono::Duration::days(90),
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
    fn risk_level_thresholds() {
        let now = Utc::now();
        let mut u = sample(now);
        u.risk_score = 20;
        assert_eq!(u.risk_level(), RiskLevel::Low);
        u.risk_score = 21;
        assert_eq!(u.risk_level(), RiskLevel::Medium);
        u.risk_score = 50;
        assert_eq!(u.risk_level(), RiskLevel::Medium);
        u.risk_score = 51;
        assert_eq!(u.risk_level(), RiskLevel::High);
        u.risk_score = 80;
        assert_eq!(u.risk_level(), RiskLevel::High);
        u.risk_score = 81;
        assert_eq!(u.risk_level(), RiskLevel::Critical);
    }

    #[test]
    fn requires_mfa_on_clearance_or_risk() {
        let now = Utc::now();
        let mut u = sample(now);
        assert!(!u.requires_mfa());
        u.security_clearance = "SECRET".into();
        assert!(u.requires_mfa());
        u.security_clearance = "PUBLIC".into();
        u.risk_score = 60;
        assert!(u.requires_mfa());
    }

    #[test]
    fn expiry_checks_both_ttl_and_password() {
        let now = Utc::now();
        let mut u = sample(now);
        u.cache_timestamp = now - chrono::Duration::seconds(400);
        u.ttl_seconds = 300;
        assert!(u.is_expired(now));

        let mut u2 = sample(now);
        u2.password_expiry = now - chrono::Duration::seconds(1);
        assert!(u2.is_expired(now));
    }

    #[test]
    fn clear_sensitive_zeroes_secret_fields() {
        let now = Utc::now();
        let mut u = sample(now);
        u.mfa_secrets.insert("totp".into(), "seed".into());
        u.clear_sensitive();
        assert!(u.password_hash.is_empty());
        assert!(u.salt.is_empty());
        assert!(u.mfa_secrets.is_empty());
    }

    #[test]
    fn is_locked_respects_unlock_time() {
        let now = Utc::now();
        let mut u = sample(now);
        u.status = UserStatus::Locked;
        u.lockout_info = Some(LockoutInfo {
            lockout_time: now,
            unlock_time: now + chrono::Duration::minutes(15),
            reason: "too-many-failures".into(),
            attempt_count: 5,
            policy_id: None,
        });
        assert!(u.is_locked(now));
        assert!(!u.is_locked(now + chrono::Duration::minutes(16)));
    }
}
