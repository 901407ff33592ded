//! In-memory stand-ins for the pooled backends, available under the
//! `test-util` feature so integration tests can drive the tier coordinator
//! through real fill/promote logic without a live Redis/Mongo/LDAP
//! deployment.

use crate::model::user_record::UserRecord;
use crate::pools::backend::{DirectoryBackend, DocBackend, KvBackend};
use crate::tls::pool_base::PoolStats;
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A directory authority (L4) backed by a seeded in-memory map instead of
/// an LDAP connection.
#[derive(Default)]
pub struct FakeDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
    stats: PoolStats,
}

impl FakeDirectory {
    /// Build an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user the directory will resolve on lookup.
    pub fn seed(&self, record: UserRecord) {
        self.users.write().insert(record.username.clone(), record);
    }
}

#[async_trait]
impl DirectoryBackend for FakeDirectory {
    async fn lookup(&self, username: &str) -> crate::Result<Option<UserRecord>> {
        self.stats.record_attempt();
        Ok(self.users.read().get(username).cloned())
    }

    fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

/// A key/value store (L2) backed by an in-memory map instead of Redis.
#[derive(Default)]
pub struct FakeKv {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    stats: PoolStats,
}

impl FakeKv {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for FakeKv {
    async fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        self.stats.record_attempt();
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8], _ttl_seconds: u64) -> crate::Result<()> {
        self.stats.record_attempt();
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn del(&self, key: &str) -> crate::Result<()> {
        self.stats.record_attempt();
        self.entries.write().remove(key);
        Ok(())
    }

    fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

/// A document store (L3) backed by an in-memory map instead of MongoDB.
#[derive(Default)]
pub struct FakeDoc {
    entries: RwLock<HashMap<String, Document>>,
    stats: PoolStats,
}

impl FakeDoc {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocBackend for FakeDoc {
    async fn get(&self, username: &str) -> crate::Result<Option<Document>> {
        self.stats.record_attempt();
        Ok(self.entries.read().get(username).cloned())
    }

    async fn put(
        &self,
        username: &str,
        user_data: &str,
        cache_time_ms: i64,
        cache_expiry_ms: i64,
        region: &str,
    ) -> crate::Result<()> {
        self.stats.record_attempt();
        self.entries.write().insert(
            username.to_string(),
            doc! {
                "username": username,
                "userData": user_data,
                "cacheTime": cache_time_ms,
                "cacheExpiry": cache_expiry_ms,
                "region": region,
            },
        );
        Ok(())
    }

    async fn remove(&self, username: &str) -> crate::Result<()> {
        self.stats.record_attempt();
        self.entries.write().remove(username);
        Ok(())
    }

    fn stats(&self) -> &PoolStats {
        &self.stats
    }
}
