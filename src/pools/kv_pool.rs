//! Pooled, TLS-protected client to the remote key/value store (L2).
//!
//! Grounded on the Redis connection-pooling and TTL-keyed caching pattern in
//! `login_performance.rs`'s `LoginPerformanceService`, generalized from a
//! single login-cache use case to the general `get`/`set`/`del`/`ping`
//! contract this tier needs.

use crate::config::RedisConfig;
use crate::error::AuthCacheError;
use crate::pools::backend::KvBackend;
use crate::tls::pool_base::{MtlsPoolBase, PoolStats};
use async_trait::async_trait;
use deadpool_redis::{Config as DeadpoolConfig, Runtime as DeadpoolRuntime};
use redis::AsyncCommands;
use std::time::Duration;

/// Pool sizing fixed by contract: 50 max, 20 max idle, 5 min idle, 3s wait.
pub const MAX_TOTAL: usize = 50;
/// Minimum idle connections maintained by the background task.
pub const MIN_IDLE: usize = 5;
/// How long `get_resource` blocks before giving up.
pub const MAX_WAIT: Duration = Duration::from_millis(3000);
/// How often the idle-eviction sweep runs.
pub const EVICTION_RUN_INTERVAL: Duration = Duration::from_secs(30);

/// Pooled client to the remote key/value store.
pub struct KvPool {
    pool: deadpool_redis::Pool,
    base: MtlsPoolBase,
}

impl KvPool {
    /// Parse `config.url` (`scheme://[user:pass@]host:port`, `scheme in
    /// {kv, kvs}`) and build the pool. TLS is on whenever the scheme is
    /// `kvs`, matching the contract's "TLS on by default" stance.
    pub async fn init(config: &RedisConfig) -> crate::Result<Self> {
        let base = MtlsPoolBase::init(
            "kv-pool",
            config.tls.keystore_path.as_deref(),
            config.tls.keystore_password.as_deref(),
            config.tls.truststore_path.as_deref(),
            config.tls.truststore_password.as_deref(),
        )?;

        let redis_url = Self::normalize_url(&config.url, config.password.as_deref());
        let mut cfg = DeadpoolConfig::from_url(redis_url);
        cfg.pool = Some(deadpool_redis::PoolConfig {
            max_size: MAX_TOTAL,
            timeouts: deadpool_redis::Timeouts {
                wait: Some(MAX_WAIT),
                create: Some(Duration::from_millis(5000)),
                recycle: Some(Duration::from_millis(10_000)),
            },
            queue_mode: deadpool_redis::QueueMode::Fifo,
        });
        let pool = cfg
            .create_pool(Some(DeadpoolRuntime::Tokio1))
            .map_err(|e| AuthCacheError::config_error(format!("kv-pool: {e}")))?;

        log::info!("kv-pool initialized against {}", Self::sanitize_url(&config.url));
        Ok(Self { pool, base })
    }

    fn normalize_url(url: &str, password: Option<&str>) -> String {
        // `kv://` and `kvs://` are this contract's aliases; redis-rs expects
        // `redis://` / `rediss://`.
        let base = url
            .replacen("kvs://", "rediss://", 1)
            .replacen("kv://", "redis://", 1);
        match password {
            Some(pw) if !base.contains('@') => {
                base.replacen("://", &format!("://:{pw}@"), 1)
            }
            _ => base,
        }
    }

    fn sanitize_url(url: &str) -> String {
        match url.find('@') {
            Some(idx) => format!("{}@{}", "***", &url[idx + 1..]),
            None => url.to_string(),
        }
    }

    /// Fetch a value, or `None` if the key is absent.
    pub async fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        self.base.stats().record_attempt();
        let mut conn = self.acquire().await?;
        let result: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| self.fail(format!("GET failed: {e}")))?;
        Ok(result)
    }

    /// Store a value with a TTL, in seconds.
    pub async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> crate::Result<()> {
        self.base.stats().record_attempt();
        let mut conn = self.acquire().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(|e| self.fail(format!("SETEX failed: {e}")))?;
        Ok(())
    }

    /// Delete a key. Absence of the key is not an error.
    pub async fn del(&self, key: &str) -> crate::Result<()> {
        self.base.stats().record_attempt();
        let mut conn = self.acquire().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| self.fail(format!("DEL failed: {e}")))?;
        Ok(())
    }

    /// Liveness check; marks the pool unhealthy (via `PoolStats`) on failure
    /// so the next `get_resource`-equivalent call re-attempts.
    pub async fn ping(&self) -> bool {
        self.base.stats().record_health_check();
        match self.acquire().await {
            Ok(mut conn) => redis::cmd("PING").query_async::<_, String>(&mut conn).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Shared counters/health for this pool.
    pub fn stats(&self) -> &PoolStats {
        self.base.stats()
    }

    async fn acquire(&self) -> crate::Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| self.fail(format!("pool exhausted or connect failed: {e}")))
    }

    fn fail(&self, context: String) -> AuthCacheError {
        self.base.stats().record_failure();
        log::warn!("kv-pool: {context}");
        AuthCacheError::backend_unavailable(context)
    }
}

#[async_trait]
impl KvBackend for KvPool {
    async fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        self.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> crate::Result<()> {
        self.set(key, value, ttl_seconds).await
    }

    async fn del(&self, key: &str) -> crate::Result<()> {
        self.del(key).await
    }

    fn stats(&self) -> &PoolStats {
        self.stats()
    }
}
