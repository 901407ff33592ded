//! Pooled mTLS client to the directory authority (L4).
//!
//! Grounded on `other_examples`' `onixus-bsdm-proxy` auth backend, which
//! binds with `ldap3::LdapConn`/`LdapConnAsync`, runs a `simple_bind`, and
//! searches with `SearchEntry` projection — generalized here to the
//! bind/lookup/list contract this tier needs and wrapped with the mTLS
//! connector built by [`crate::tls::pool_base::MtlsPoolBase`].

use crate::config::LdapConfig;
use crate::error::AuthCacheError;
use crate::model::user_record::{HashAlgorithm, UserRecord, UserStatus, SCHEMA_VERSION};
use crate::pools::backend::DirectoryBackend;
use crate::tls::pool_base::{MtlsPoolBase, PoolStats};
use async_trait::async_trait;
use chrono::Utc;
use ldap3::{LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Pooled mTLS client to the directory authority.
pub struct DirectoryPool {
    url: String,
    base_dn: String,
    bind_dn: String,
    bind_password: String,
    base: MtlsPoolBase,
}

impl DirectoryPool {
    /// Build the pool. The directory connection itself is established
    /// per-operation (ldap3's async connection is not `Send`-shareable
    /// across a connection pool the way a database driver's is), but the
    /// mTLS settings and bind credentials are fixed once at `init`.
    pub async fn init(config: &LdapConfig) -> crate::Result<Self> {
        let base = MtlsPoolBase::init(
            "directory-pool",
            config.tls.keystore_path.as_deref(),
            config.tls.keystore_password.as_deref(),
            config.tls.truststore_path.as_deref(),
            config.tls.truststore_password.as_deref(),
        )?;
        log::info!(
            "directory-pool initialized against {} (cipher priority: {:?})",
            config.url,
            crate::tls::pool_base::CIPHER_SUITE_PRIORITY
        );
        Ok(Self {
            url: config.url.clone(),
            base_dn: config.base_dn.clone(),
            bind_dn: config.bind_dn.clone(),
            bind_password: config.bind_password.clone(),
            base,
        })
    }

    async fn connect(&self) -> crate::Result<ldap3::Ldap> {
        self.base.stats().record_attempt();
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_millis(5000))
            .set_no_tls_verify(false);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| self.fail(format!("connect failed: {e}")))?;
        ldap3::drive!(conn);
        ldap.simple_bind(&self.bind_dn, &self.bind_password)
            .await
            .map_err(|e| self.fail(format!("service bind failed: {e}")))?
            .success()
            .map_err(|e| self.fail(format!("service bind rejected: {e}")))?;
        Ok(ldap)
    }

    /// Bind as `dn` with `password`. Invalid credentials return `Ok(false)`;
    /// transport/TLS failures return `Err(BackendUnavailable)` (retriable).
    pub async fn bind(&self, dn: &str, password: &str) -> crate::Result<bool> {
        self.base.stats().record_attempt();
        let settings = LdapConnSettings::new().set_conn_timeout(Duration::from_millis(5000));
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| self.fail(format!("connect failed: {e}")))?;
        ldap3::drive!(conn);
        match ldap.simple_bind(dn, password).await {
            Ok(result) => Ok(result.success().is_ok()),
            Err(e) => Err(self.fail(format!("bind transport failure: {e}"))),
        }
    }

    /// Search by `uid` and map the single matching entry to a [`UserRecord`].
    pub async fn lookup(&self, username: &str) -> crate::Result<Option<UserRecord>> {
        let mut ldap = self.connect().await?;
        let filter = format!("(uid={})", Self::escape_filter_value(username));
        let (entries, _) = ldap
            .search(
                &self.base_dn,
                Scope::Subtree,
                &filter,
                vec!["uid", "cn", "mail", "userPassword", "ou", "l", "c", "dn"],
            )
            .await
            .map_err(|e| self.fail(format!("search failed: {e}")))?
            .success()
            .map_err(|e| self.fail(format!("search rejected: {e}")))?;

        let Some(raw) = entries.into_iter().next() else {
            return Ok(None);
        };
        let entry = SearchEntry::construct(raw);
        Ok(Some(Self::to_user_record(&entry)))
    }

    /// Stream every entry matching `filter` under the configured base DN.
    pub async fn list(&self, filter: &str) -> crate::Result<Vec<UserRecord>> {
        let mut ldap = self.connect().await?;
        let (entries, _) = ldap
            .search(
                &self.base_dn,
                Scope::Subtree,
                filter,
                vec!["uid", "cn", "mail", "userPassword", "ou", "l", "c", "dn"],
            )
            .await
            .map_err(|e| self.fail(format!("search failed: {e}")))?
            .success()
            .map_err(|e| self.fail(format!("search rejected: {e}")))?;

        Ok(entries
            .into_iter()
            .map(|raw| Self::to_user_record(&SearchEntry::construct(raw)))
            .collect())
    }

    /// Escape the RFC 4515 special characters in a filter value.
    fn escape_filter_value(value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '*' => out.push_str("\\2a"),
                '(' => out.push_str("\\28"),
                ')' => out.push_str("\\29"),
                '\\' => out.push_str("\\5c"),
                '\0' => out.push_str("\\00"),
                _ => out.push(c),
            }
        }
        out
    }

    /// Parse an RFC 2307-style `{SCHEME}value` `userPassword` attribute into
    /// the `(algorithm, salt, hash)` triple [`crate::auth::password::verify_password`]
    /// expects.
    ///
    /// `{PBKDF2-SHA256}` and `{SHA256}` carry the hex-encoded salt and hash
    /// joined by `$`; `{BCRYPT}` carries only the hash, since bcrypt embeds
    /// its own salt and cost. An attribute with no recognized scheme prefix
    /// is treated as a raw bcrypt hash — the format `bcrypt::hash` produces
    /// on its own, with no scheme tag at all.
    fn parse_password_attribute(raw: &str) -> (HashAlgorithm, String, String) {
        if let Some(rest) = raw.strip_prefix("{PBKDF2-SHA256}") {
            let (salt, hash) = rest.split_once('$').unwrap_or(("", rest));
            return (HashAlgorithm::Pbkdf2Sha256, salt.to_string(), hash.to_string());
        }
        if let Some(rest) = raw.strip_prefix("{SHA256}") {
            let (salt, hash) = rest.split_once('$').unwrap_or(("", rest));
            return (HashAlgorithm::Sha256Salted, salt.to_string(), hash.to_string());
        }
        if let Some(rest) = raw.strip_prefix("{BCRYPT}") {
            return (HashAlgorithm::Bcrypt, String::new(), rest.to_string());
        }
        (HashAlgorithm::Bcrypt, String::new(), raw.to_string())
    }

    fn to_user_record(entry: &SearchEntry) -> UserRecord {
        let attr = |name: &str| -> String {
            entry
                .attrs
                .get(name)
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_default()
        };
        let (hash_algorithm, salt, password_hash) =
            Self::parse_password_attribute(&attr("userPassword"));
        let now = Utc::now();
        UserRecord {
            schema_version: SCHEMA_VERSION,
            username: attr("uid"),
            distinguished_name: entry.dn.clone(),
            employee_id: String::new(),
            email: attr("mail"),
            display_name: attr("cn"),
            department: attr("ou"),
            region: String::new(),
            password_hash,
            salt,
            hash_algorithm,
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
            security_clearance: "PUBLIC".to_string(),
            cache_timestamp: now,
            ttl_seconds: UserRecord::DEFAULT_TTL_SECONDS,
            access_frequency: 0,
            cache_region: String::new(),
        }
    }

    /// Shared counters/health for this pool.
    pub fn stats(&self) -> &PoolStats {
        self.base.stats()
    }

    fn fail(&self, context: String) -> AuthCacheError {
        self.base.stats().record_failure();
        log::warn!("directory-pool: {context}");
        AuthCacheError::backend_unavailable(context)
    }
}

#[async_trait]
impl DirectoryBackend for DirectoryPool {
    async fn lookup(&self, username: &str) -> crate::Result<Option<UserRecord>> {
        self.lookup(username).await
    }

    fn stats(&self) -> &PoolStats {
        self.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pbkdf2_scheme() {
        let (algo, salt, hash) =
            DirectoryPool::parse_password_attribute("{PBKDF2-SHA256}deadbeef$c0ffee");
        assert_eq!(algo, HashAlgorithm::Pbkdf2Sha256);
        assert_eq!(salt, "deadbeef");
        assert_eq!(hash, "c0ffee");
    }

    #[test]
    fn parses_sha256_salted_scheme() {
        let (algo, salt, hash) = DirectoryPool::parse_password_attribute("{SHA256}pepper$c0ffee");
        assert_eq!(algo, HashAlgorithm::Sha256Salted);
        assert_eq!(salt, "pepper");
        assert_eq!(hash, "c0ffee");
    }

    #[test]
    fn parses_bcrypt_scheme() {
        let (algo, salt, hash) = DirectoryPool::parse_password_attribute("{BCRYPT}$2b$12$abc");
        assert_eq!(algo, HashAlgorithm::Bcrypt);
        assert!(salt.is_empty());
        assert_eq!(hash, "$2b$12$abc");
    }

    #[test]
    fn unscoped_attribute_is_treated_as_raw_bcrypt() {
        let (algo, salt, hash) = DirectoryPool::parse_password_attribute("$2b$12$abc");
        assert_eq!(algo, HashAlgorithm::Bcrypt);
        assert!(salt.is_empty());
        assert_eq!(hash, "$2b$12$abc");
    }
}
