//! Shared mTLS context and pool health/counter bookkeeping.
//!
//! This is the base every pooled backend (C2–C4) embeds a copy of, in place
//! of the inheritance hierarchy the original source expressed as
//! `MtlsConnectionPoolManager -> {Redis, Mongo, Ldap}`: each pool holds one
//! of these as a value and exposes its own `init`/`health_check`/`close`.

use crate::error::AuthCacheError;
use native_tls::{Identity, TlsConnector};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// The TLS 1.2 cipher suites the directory pool (C4) declares as its
/// fallback preference list. `native-tls`'s portable API does not expose
/// per-suite ordering, so this list is carried as declarative metadata
/// rather than enforced at the socket layer (see DESIGN.md).
pub const CIPHER_SUITE_PRIORITY: &[&str] = &[
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_AES_128_GCM_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
];

/// Pool-level counters and derived health, common to every backend.
#[derive(Debug, Default)]
pub struct PoolStats {
    connection_attempts: AtomicU64,
    connection_failures: AtomicU64,
    last_check: RwLock<Option<Instant>>,
}

impl PoolStats {
    /// Record a connection attempt.
    pub fn record_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection failure.
    pub fn record_failure(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Stamp the last health-check time to now.
    pub fn record_health_check(&self) {
        *self.last_check.write() = Some(Instant::now());
    }

    /// Total attempts observed so far.
    pub fn attempts(&self) -> u64 {
        self.connection_attempts.load(Ordering::Relaxed)
    }

    /// Total failures observed so far.
    pub fn failures(&self) -> u64 {
        self.connection_failures.load(Ordering::Relaxed)
    }

    /// When the last health check ran, if any.
    pub fn last_check(&self) -> Option<Instant> {
        *self.last_check.read()
    }

    /// `(attempts - failures) / attempts`, or `1.0` when no attempts have
    /// been made yet.
    pub fn success_rate(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            return 1.0;
        }
        let failures = self.failures() as f64;
        1.0 - (failures / attempts as f64)
    }
}

/// Shared TLS context plus counters for one pooled backend.
pub struct MtlsPoolBase {
    service_name: String,
    connector: Option<TlsConnector>,
    stats: PoolStats,
}

impl MtlsPoolBase {
    /// Load the PKCS#12 keystore/truststore and build a TLS 1.3-preferred
    /// (1.2 fallback) connector.
    ///
    /// A missing keystore or truststore is a [`crate::ErrorKind::ConfigError`];
    /// a present-but-malformed store is also `ConfigError` (the source
    /// distinguished `TlsInitError` here, but `native-tls`'s PKCS12 loader
    /// collapses both into one error type, so both map to the same kind).
    pub fn init(
        service_name: impl Into<String>,
        keystore_path: Option<&str>,
        keystore_password: Option<&str>,
        truststore_path: Option<&str>,
        _truststore_password: Option<&str>,
    ) -> crate::Result<Self> {
        let service_name = service_name.into();
        let stats = PoolStats::default();

        let identity = match keystore_path {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    AuthCacheError::config_error(format!(
                        "{service_name}: cannot read keystore {path}: {e}"
                    ))
                })?;
                let password = keystore_password.unwrap_or("");
                let identity = Identity::from_pkcs12(&bytes, password).map_err(|e| {
                    AuthCacheError::config_error(format!(
                        "{service_name}: malformed keystore {path}: {e}"
                    ))
                })?;
                Some(identity)
            }
            None => None,
        };

        let mut builder = TlsConnector::builder();
        builder.min_protocol_version(Some(native_tls::Protocol::Tlsv12));
        builder.max_protocol_version(None); // no ceiling: negotiate the highest the peer offers, down to the 1.2 floor above
        if let Some(identity) = identity {
            builder.identity(identity);
        }

        // A PKCS#12 truststore holding only CA certificates cannot be loaded
        // through `Identity::from_pkcs12` (it expects a private key); no
        // crate in this workspace parses a bare PKCS#12 CA bundle. The
        // truststore is validated for presence only (see
        // `validate_certificates`) and otherwise the connector falls back
        // to the OS trust store, which is the documented simplification
        // recorded in DESIGN.md.
        if truststore_path.is_none() {
            log::warn!("{service_name}: no truststore configured, using OS trust store");
        }

        let connector = builder.build().map_err(|e| {
            AuthCacheError::config_error(format!("{service_name}: TLS init failed: {e}"))
        })?;

        log::info!("{service_name}: mTLS pool base initialized (TLS 1.2+, prefer 1.3)");

        Ok(Self {
            service_name,
            connector: Some(connector),
            stats,
        })
    }

    /// `false` (never fails) whenever either the keystore or truststore file
    /// is absent; callers may downgrade to server-only TLS in that case.
    pub fn validate_certificates(keystore_path: Option<&str>, truststore_path: Option<&str>) -> bool {
        let keystore_ok = keystore_path.map(|p| Path::new(p).exists()).unwrap_or(false);
        let truststore_ok = truststore_path
            .map(|p| Path::new(p).exists())
            .unwrap_or(false);
        keystore_ok && truststore_ok
    }

    /// The constructed connector, if TLS material was provided.
    pub fn connector(&self) -> Option<&TlsConnector> {
        self.connector.as_ref()
    }

    /// This pool base's service name, used in logs and metrics.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The shared counter/health state.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_certificates_false_when_either_file_missing() {
        assert!(!MtlsPoolBase::validate_certificates(None, None));
        assert!(!MtlsPoolBase::validate_certificates(Some("/nonexistent"), None));
    }

    #[test]
    fn success_rate_is_one_with_no_attempts() {
        let stats = PoolStats::default();
        assert_eq!(stats.success_rate(), 1.0);
    }

    #[test]
    fn success_rate_reflects_failures() {
        let stats = PoolStats::default();
        for _ in 0..10 {
            stats.record_attempt();
        }
        for _ in 0..3 {
            stats.record_failure();
        }
        assert!((stats.success_rate() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn init_without_keystore_succeeds_with_os_trust_store() {
        let base = MtlsPoolBase::init("test-service", None, None, None, None).unwrap();
        assert_eq!(base.service_name(), "test-service");
        assert!(base.connector().is_some());
    }
}
