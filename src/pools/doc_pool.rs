//! Pooled, TLS-protected client to the document store (L3).

use crate::config::MongoConfig;
use crate::error::AuthCacheError;
use crate::pools::backend::DocBackend;
use crate::tls::pool_base::{MtlsPoolBase, PoolStats};
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use std::time::Duration;

/// Name of the authoritative users collection.
pub const USERS_COLLECTION: &str = "users";
/// Name of the cache-statistics collection (TTL 30 days).
pub const CACHE_STATS_COLLECTION: &str = "cache_stats";
/// Name of the security-log collection (TTL 90 days).
pub const SECURITY_LOGS_COLLECTION: &str = "security_logs";
/// Name of the seeded regions collection.
pub const REGIONS_COLLECTION: &str = "regions";

/// Pooled client to the document store.
pub struct DocPool {
    client: Client,
    database: String,
    base: MtlsPoolBase,
}

impl DocPool {
    /// Connect, configure pool sizing (`min=5, max=50, idle_ttl=30s,
    /// connect=5000ms`), and create the schema documented in the
    /// directory/document-store contract (§6): the unique index on
    /// `username`, the TTL index on `cacheExpiry`, and the secondary
    /// indexes.
    pub async fn init(config: &MongoConfig) -> crate::Result<Self> {
        let base = MtlsPoolBase::init(
            "doc-pool",
            config.tls.keystore_path.as_deref(),
            config.tls.keystore_password.as_deref(),
            config.tls.truststore_path.as_deref(),
            config.tls.truststore_password.as_deref(),
        )?;

        let mut options = ClientOptions::parse(&config.url)
            .await
            .map_err(|e| AuthCacheError::config_error(format!("doc-pool: bad URL: {e}")))?;
        options.min_pool_size = Some(5);
        options.max_pool_size = Some(50);
        options.max_idle_time = Some(Duration::from_secs(30));
        options.connect_timeout = Some(Duration::from_millis(5000));

        let client = Client::with_options(options)
            .map_err(|e| AuthCacheError::config_error(format!("doc-pool: connect failed: {e}")))?;

        let pool = Self {
            client,
            database: config.database.clone(),
            base,
        };
        pool.ensure_schema().await?;
        log::info!("doc-pool initialized against database {}", pool.database);
        Ok(pool)
    }

    async fn ensure_schema(&self) -> crate::Result<()> {
        let users = self.users_collection();

        let unique_username = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let ttl_expiry = IndexModel::builder()
            .keys(doc! { "cacheExpiry": 1 })
            .options(IndexOptions::builder().expire_after(Duration::from_secs(0)).build())
            .build();
        let region_idx = IndexModel::builder().keys(doc! { "region": 1 }).build();
        let access_count_idx = IndexModel::builder()
            .keys(doc! { "accessCount": -1 })
            .build();
        let cache_time_idx = IndexModel::builder().keys(doc! { "cacheTime": -1 }).build();
        let compound_idx = IndexModel::builder()
            .keys(doc! { "region": 1, "accessCount": -1 })
            .build();

        for index in [
            unique_username,
            ttl_expiry,
            region_idx,
            access_count_idx,
            cache_time_idx,
            compound_idx,
        ] {
            users.create_index(index, None).await.map_err(|e| {
                AuthCacheError::config_error(format!("doc-pool: index creation failed: {e}"))
            })?;
        }
        Ok(())
    }

    fn users_collection(&self) -> Collection<Document> {
        self.client.database(&self.database).collection(USERS_COLLECTION)
    }

    /// Read a cached user document by username, returning the raw BSON
    /// document (encrypted `userData` field intact — decryption is the L1
    /// cache's responsibility, not this pool's).
    pub async fn get(&self, username: &str) -> crate::Result<Option<Document>> {
        self.base.stats().record_attempt();
        self.users_collection()
            .find_one(doc! { "username": username }, None)
            .await
            .map_err(|e| self.fail(format!("find_one failed: {e}")))
    }

    /// Upsert a cached user document and bump `accessCount`.
    pub async fn put(
        &self,
        username: &str,
        user_data: &str,
        cache_time_ms: i64,
        cache_expiry_ms: i64,
        region: &str,
    ) -> crate::Result<()> {
        self.base.stats().record_attempt();
        let filter = doc! { "username": username };
        let update = doc! {
            "$set": {
                "userData": user_data,
                "cacheTime": cache_time_ms,
                "cacheExpiry": cache_expiry_ms,
                "region": region,
            },
            "$inc": { "accessCount": 1i64 },
            "$setOnInsert": { "username": username },
        };
        let options = mongodb::options::UpdateOptions::builder()
            .upsert(true)
            .build();
        self.users_collection()
            .update_one(filter, update, options)
            .await
            .map_err(|e| self.fail(format!("upsert failed: {e}")))?;
        Ok(())
    }

    /// Remove a cached user document.
    pub async fn remove(&self, username: &str) -> crate::Result<()> {
        self.base.stats().record_attempt();
        self.users_collection()
            .delete_one(doc! { "username": username }, None)
            .await
            .map_err(|e| self.fail(format!("delete_one failed: {e}")))?;
        Ok(())
    }

    /// Liveness ping against the server.
    pub async fn ping(&self) -> bool {
        self.base.stats().record_health_check();
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 }, None)
            .await
            .is_ok()
    }

    /// Shared counters/health for this pool.
    pub fn stats(&self) -> &PoolStats {
        self.base.stats()
    }

    fn fail(&self, context: String) -> AuthCacheError {
        self.base.stats().record_failure();
        log::warn!("doc-pool: {context}");
        AuthCacheError::backend_unavailable(context)
    }
}

#[async_trait]
impl DocBackend for DocPool {
    async fn get(&self, username: &str) -> crate::Result<Option<Document>> {
        self.get(username).await
    }

    async fn put(
        &self,
        username: &str,
        user_data: &str,
        cache_time_ms: i64,
        cache_expiry_ms: i64,
        region: &str,
    ) -> crate::Result<()> {
        self.put(username, user_data, cache_time_ms, cache_expiry_ms, region).await
    }

    async fn remove(&self, username: &str) -> crate::Result<()> {
        self.remove(username).await
    }

    fn stats(&self) -> &PoolStats {
        self.stats()
    }
}
