//! Wires the cache tiers, the authentication pipeline, and the façade into
//! one process-wide object, and drives the scheduled background tasks.
//!
//! Per the concurrency model this crate follows, request-serving work runs
//! on the caller's own Tokio runtime (sized to the fixed 10-worker I/O
//! pool), while periodic maintenance — L1 key rotation, the L1 TTL sweep,
//! and pool health snapshots — runs on a small dedicated runtime so a slow
//! directory lookup can never delay a rotation or sweep tick.

use crate::cache::distributed::DistributedAuthCache;
use crate::client::facade::AuthClient;
use crate::config::Config;
use crate::error::AuthCacheError;
use crate::pools::{DirectoryBackend, DirectoryPool, DocBackend, DocPool, KvBackend, KvPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How many worker threads the scheduled-task runtime gets.
pub const SCHEDULED_POOL_WORKERS: usize = 2;

/// Process-wide handle: holds the façade plus the scheduled-task runtime and
/// its spawned tasks. Dropping this stops the scheduled tasks; request
/// handling through `client()` keeps working as long as the `AuthClient`
/// clone outlives it.
pub struct Runtime {
    client: AuthClient,
    scheduled: tokio::runtime::Runtime,
    tasks: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Build every pool, the tier coordinator, and the façade, and start the
    /// scheduled background tasks.
    ///
    /// L2 and L3 are best-effort: a pool that fails to initialize (most
    /// commonly a missing keystore) is logged and skipped rather than
    /// failing the whole process, so the service still runs — degraded —
    /// off L1 and the directory alone. L4 is mandatory: without it there is
    /// no way to fill a cache miss, so its init failure is fatal.
    pub async fn init(config: &Config) -> crate::Result<Self> {
        let l2: Option<Arc<dyn KvBackend>> = match KvPool::init(&config.redis).await {
            Ok(pool) => Some(Arc::new(pool)),
            Err(e) => {
                log::warn!("runtime: L2 (kv) pool unavailable, continuing without it: {e}");
                None
            }
        };
        let l3: Option<Arc<dyn DocBackend>> = match DocPool::init(&config.mongodb).await {
            Ok(pool) => Some(Arc::new(pool)),
            Err(e) => {
                log::warn!("runtime: L3 (doc) pool unavailable, continuing without it: {e}");
                None
            }
        };
        let l4: Arc<dyn DirectoryBackend> = Arc::new(DirectoryPool::init(&config.ldap).await?);

        let cache = Arc::new(DistributedAuthCache::new(l2, l3, l4)?);
        let client = AuthClient::new(cache);

        let scheduled = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(SCHEDULED_POOL_WORKERS)
            .thread_name("authcache-scheduled")
            .enable_all()
            .build()
            .map_err(|e| AuthCacheError::internal(format!("scheduled runtime init failed: {e}")))?;

        let tasks = Self::spawn_scheduled_tasks(&scheduled, client.clone());

        Ok(Self {
            client,
            scheduled,
            tasks,
        })
    }

    fn spawn_scheduled_tasks(
        scheduled: &tokio::runtime::Runtime,
        client: AuthClient,
    ) -> Vec<JoinHandle<()>> {
        let rotation_client = client.clone();
        let rotation = scheduled.spawn(async move {
            let mut interval =
                tokio::time::interval(crate::cache::secure_memory::KEY_ROTATION_INTERVAL);
            loop {
                interval.tick().await;
                rotation_client.rotate_l1_keys();
            }
        });

        let sweep_client = client.clone();
        let sweep = scheduled.spawn(async move {
            let mut interval = tokio::time::interval(crate::cache::secure_memory::SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                sweep_client.sweep_l1();
            }
        });

        let stats_client = client;
        let stats = scheduled.spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let stats = stats_client.service_statistics().await;
                log::debug!(
                    "cache snapshot: l1_size={} hit_ratio={:.3} total_requests={}",
                    stats.cache_size_l1,
                    stats.hit_ratio,
                    stats.total_requests
                );
            }
        });

        vec![rotation, sweep, stats]
    }

    /// The façade for authenticating requests, cheap to clone and hand to
    /// request-handling tasks on the caller's own runtime.
    pub fn client(&self) -> &AuthClient {
        &self.client
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
