//! Trait seams over the three pooled backends (C2-C4), so the tier
//! coordinator can be driven by an in-memory fake under the `test-util`
//! feature instead of a live Redis/Mongo/LDAP deployment.

use crate::model::user_record::UserRecord;
use crate::tls::pool_base::PoolStats;
use async_trait::async_trait;
use mongodb::bson::Document;

/// What the tier coordinator needs from the key/value store (L2).
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Fetch a value, or `None` if the key is absent.
    async fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>>;
    /// Store a value with a TTL, in seconds.
    async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> crate::Result<()>;
    /// Delete a key. Absence of the key is not an error.
    async fn del(&self, key: &str) -> crate::Result<()>;
    /// Shared counters/health for this pool.
    fn stats(&self) -> &PoolStats;
}

/// What the tier coordinator needs from the document store (L3).
#[async_trait]
pub trait DocBackend: Send + Sync {
    /// Read a cached user document by username.
    async fn get(&self, username: &str) -> crate::Result<Option<Document>>;
    /// Upsert a cached user document.
    async fn put(
        &self,
        username: &str,
        user_data: &str,
        cache_time_ms: i64,
        cache_expiry_ms: i64,
        region: &str,
    ) -> crate::Result<()>;
    /// Remove a cached user document.
    async fn remove(&self, username: &str) -> crate::Result<()>;
    /// Shared counters/health for this pool.
    fn stats(&self) -> &PoolStats;
}

/// What the tier coordinator needs from the directory authority (L4).
#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    /// Look up a user by username.
    async fn lookup(&self, username: &str) -> crate::Result<Option<UserRecord>>;
    /// Shared counters/health for this pool.
    fn stats(&self) -> &PoolStats;
}
