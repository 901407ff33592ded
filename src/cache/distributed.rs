//! The tier coordinator: searches L1 → L2 → L3 on read, falls all the way
//! through to L4 on miss, and promotes upward on every hit.

use crate::cache::region_mapper::RegionMapper;
use crate::cache::secure_memory::SecureMemoryCache;
use crate::cache::singleflight::SingleFlight;
use crate::crypto::symmetric::{Aes256GcmCipher, EncryptedData};
use crate::error::AuthCacheError;
use crate::model::result::CacheTier;
use crate::model::user_record::{UserRecord, SCHEMA_VERSION};
use crate::pools::{DirectoryBackend, DocBackend, KvBackend};
use chrono::Utc;
use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn kv_key(username: &str) -> String {
    format!("user:{username}")
}

/// Snapshot of the cache's counters, per §4.11/§4.8.
#[derive(Debug, Clone, Default)]
pub struct CacheStatistics {
    /// Entries currently resident in L1.
    pub cache_size_l1: usize,
    /// Hits per tier, indexed by `CacheTier` (L1, L2, L3, L4).
    pub hits_l1: u64,
    /// See above.
    pub hits_l2: u64,
    /// See above.
    pub hits_l3: u64,
    /// Directory fills that produced a record.
    pub hits_l4: u64,
    /// Requests that found nothing in any tier or the directory.
    pub misses: u64,
    /// Total `get`/`fill` requests observed.
    pub total_requests: u64,
    /// `(hits_l1+l2+l3+l4) / total_requests`, or `0.0` with no requests yet.
    pub hit_ratio: f64,
    /// Fills currently in flight.
    pub fills_in_flight: u64,
    /// Callers that joined an in-flight fill rather than starting one.
    pub fills_coalesced: u64,
}

#[derive(Default)]
struct Counters {
    hits_l1: AtomicU64,
    hits_l2: AtomicU64,
    hits_l3: AtomicU64,
    hits_l4: AtomicU64,
    misses: AtomicU64,
    total_requests: AtomicU64,
}

/// Coordinates the four cache tiers for one process.
pub struct DistributedAuthCache {
    l1: SecureMemoryCache,
    l2: Option<Arc<dyn KvBackend>>,
    l3: Option<Arc<dyn DocBackend>>,
    l4: Arc<dyn DirectoryBackend>,
    wire_cipher: Aes256GcmCipher,
    singleflight: SingleFlight<UserRecord>,
    regions: RegionMapper,
    counters: Counters,
    l1_soft_cap: usize,
}

impl DistributedAuthCache {
    /// Default soft cap on L1 size before the LRU sweep engages.
    pub const DEFAULT_L1_SOFT_CAP: usize = 100_000;

    /// Build the coordinator. `l2`/`l3` are optional: a missing keystore
    /// for either backend means that tier is skipped (§8 scenario 3), not
    /// fatal.
    pub fn new(
        l2: Option<Arc<dyn KvBackend>>,
        l3: Option<Arc<dyn DocBackend>>,
        l4: Arc<dyn DirectoryBackend>,
    ) -> crate::Result<Self> {
        let mut wire_key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut wire_key);
        let wire_cipher = Aes256GcmCipher::new(&wire_key)
            .map_err(|e| AuthCacheError::internal(format!("wire cipher init failed: {e}")))?;

        Ok(Self {
            l1: SecureMemoryCache::new(),
            l2,
            l3,
            l4,
            wire_cipher,
            singleflight: SingleFlight::new(),
            regions: RegionMapper::new(),
            counters: Counters::default(),
            l1_soft_cap: Self::DEFAULT_L1_SOFT_CAP,
        })
    }

    fn encode(&self, record: &UserRecord) -> crate::Result<Vec<u8>> {
        let plaintext = serde_json::to_vec(record)
            .map_err(|e| AuthCacheError::internal(format!("serialize failed: {e}")))?;
        let encrypted = self
            .wire_cipher
            .encrypt(&plaintext, None)
            .map_err(|e| AuthCacheError::internal(format!("wire encrypt failed: {e}")))?;
        Ok(encrypted.to_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Option<UserRecord> {
        let encrypted = EncryptedData::from_bytes(bytes, Aes256GcmCipher::NONCE_SIZE).ok()?;
        let plaintext = self.wire_cipher.decrypt(&encrypted).ok()?;
        let record: UserRecord = serde_json::from_slice(&plaintext).ok()?;
        if record.schema_version != SCHEMA_VERSION {
            log::warn!(
                "distributed-auth-cache: refusing record with schema_version {}",
                record.schema_version
            );
            return None;
        }
        Some(record)
    }

    /// Search L1 → L2 → L3, promoting to every cheaper tier on a hit.
    /// Returns the record together with the tier that served it.
    pub async fn get(&self, username: &str) -> Option<(UserRecord, CacheTier)> {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);

        if let Some(record) = self.l1.get::<UserRecord>(username) {
            self.counters.hits_l1.fetch_add(1, Ordering::Relaxed);
            return Some((record, CacheTier::L1));
        }

        if let Some(l2) = &self.l2 {
            if let Ok(Some(bytes)) = l2.get(&kv_key(username)).await {
                if let Some(record) = self.decode(&bytes) {
                    self.counters.hits_l2.fetch_add(1, Ordering::Relaxed);
                    self.promote_to_l1(&record);
                    return Some((record, CacheTier::L2));
                }
            }
        }

        if let Some(l3) = &self.l3 {
            if let Ok(Some(doc)) = l3.get(username).await {
                if let Some(record) = Self::record_from_document(&doc, &self.wire_cipher) {
                    self.counters.hits_l3.fetch_add(1, Ordering::Relaxed);
                    self.promote_to_l1(&record);
                    if let Some(l2) = &self.l2 {
                        let _ = self.promote_to_l2(l2, &record).await;
                    }
                    return Some((record, CacheTier::L3));
                }
            }
        }

        None
    }

    fn record_from_document(
        doc: &mongodb::bson::Document,
        cipher: &Aes256GcmCipher,
    ) -> Option<UserRecord> {
        let hex_str = doc.get_str("userData").ok()?;
        let bytes = hex::decode(hex_str).ok()?;
        let encrypted = EncryptedData::from_bytes(&bytes, Aes256GcmCipher::NONCE_SIZE).ok()?;
        let plaintext = cipher.decrypt(&encrypted).ok()?;
        let record: UserRecord = serde_json::from_slice(&plaintext).ok()?;
        if record.schema_version != SCHEMA_VERSION {
            return None;
        }
        Some(record)
    }

    /// Issue a directory lookup (coalesced per username) and, on success,
    /// populate every tier. Returns `None` if the directory has no such
    /// user.
    pub async fn fill(&self, username: &str) -> crate::Result<Option<UserRecord>> {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);
        let l4 = self.l4.clone();
        let username_owned = username.to_string();

        let result = self
            .singleflight
            .run(username, move || async move { l4.lookup(&username_owned).await })
            .await;

        match result {
            Ok(Some(mut record)) => {
                self.counters.hits_l4.fetch_add(1, Ordering::Relaxed);
                if record.cache_region.is_empty() {
                    let region = self.regions.assign(
                        &record.username,
                        Some(&record.email),
                        Some(&record.distinguished_name),
                    );
                    record.region = region.to_string();
                    record.cache_region = region.to_string();
                }
                self.put_all(&record).await;
                Ok(Some(record))
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn put_all(&self, record: &UserRecord) {
        self.promote_to_l1(record);
        if let Some(l2) = &self.l2 {
            let _ = self.promote_to_l2(l2, record).await;
        }
        if let Some(l3) = &self.l3 {
            let _ = self.promote_to_l3(l3, record).await;
        }
    }

    fn promote_to_l1(&self, record: &UserRecord) {
        self.l1.put(&record.username, record);
        self.l1.evict_lru_over_capacity(self.l1_soft_cap);
    }

    async fn promote_to_l2(&self, l2: &dyn KvBackend, record: &UserRecord) -> crate::Result<()> {
        let bytes = self.encode(record)?;
        l2.set(&kv_key(&record.username), &bytes, record.effective_ttl())
            .await
    }

    async fn promote_to_l3(&self, l3: &dyn DocBackend, record: &UserRecord) -> crate::Result<()> {
        let bytes = self.encode(record)?;
        let hex_str = hex::encode(bytes);
        let now = Utc::now().timestamp_millis();
        let expiry = now + (record.effective_ttl() as i64 * 1000);
        l3.put(&record.username, &hex_str, now, expiry, &record.cache_region)
            .await
    }

    /// Remove `username` from every tier.
    pub async fn invalidate(&self, username: &str) {
        self.l1.remove(username);
        if let Some(l2) = &self.l2 {
            let _ = l2.del(&kv_key(username)).await;
        }
        if let Some(l3) = &self.l3 {
            let _ = l3.remove(username).await;
        }
    }

    /// Run the L1 key-rotation task's work once. Intended to be driven by a
    /// `tokio::time::interval` on the scheduled pool (§5).
    pub fn rotate_l1_keys(&self) {
        self.l1.rotate_keys();
    }

    /// Run the L1 TTL-sweep task's work once.
    pub fn sweep_l1(&self) {
        self.l1.sweep();
    }

    /// A snapshot of every counter this cache tracks.
    pub fn stats(&self) -> CacheStatistics {
        let hits_l1 = self.counters.hits_l1.load(Ordering::Relaxed);
        let hits_l2 = self.counters.hits_l2.load(Ordering::Relaxed);
        let hits_l3 = self.counters.hits_l3.load(Ordering::Relaxed);
        let hits_l4 = self.counters.hits_l4.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total_requests = self.counters.total_requests.load(Ordering::Relaxed);
        let total_hits = hits_l1 + hits_l2 + hits_l3 + hits_l4;
        let hit_ratio = if total_requests == 0 {
            0.0
        } else {
            total_hits as f64 / total_requests as f64
        };
        CacheStatistics {
            cache_size_l1: self.l1.size(),
            hits_l1,
            hits_l2,
            hits_l3,
            hits_l4,
            misses,
            total_requests,
            hit_ratio,
            fills_in_flight: self.singleflight.inflight_count() as u64,
            fills_coalesced: self.singleflight.coalesced_count(),
        }
    }

    /// A point-in-time health snapshot across every pool and the cache
    /// tiers, suitable for an operator-facing health endpoint.
    pub fn health_snapshot(&self) -> crate::metrics::ServiceSnapshot {
        crate::metrics::ServiceSnapshot {
            kv_pool: self.l2.as_ref().map(|p| p.stats().into()),
            doc_pool: self.l3.as_ref().map(|p| p.stats().into()),
            directory_pool: self.l4.stats().into(),
            cache: self.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user_record::{HashAlgorithm, UserStatus};
    use std::collections::{HashMap, HashSet};

    fn sample_record(username: &str) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            schema_version: SCHEMA_VERSION,
            username: username.to_string(),
            distinguished_name: format!("uid={username},dc=example,dc=com"),
            employee_id: "E1".into(),
            email: format!("{username}@example.com"),
            display_name: username.to_string(),
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
    fn encode_decode_round_trips() {
        // Exercises the wire cipher without needing a live L4 connection.
        let mut wire_key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut wire_key);
        let cipher = Aes256GcmCipher::new(&wire_key).unwrap();
        let record = sample_record("jdoe");
        let plaintext = serde_json::to_vec(&record).unwrap();
        let encrypted = cipher.encrypt(&plaintext, None).unwrap();
        let bytes = encrypted.to_bytes();

        let decrypted = EncryptedData::from_bytes(&bytes, Aes256GcmCipher::NONCE_SIZE).unwrap();
        let back = cipher.decrypt(&decrypted).unwrap();
        let round_tripped: UserRecord = serde_json::from_slice(&back).unwrap();
        assert_eq!(round_tripped.username, "jdoe");
    }

    #[test]
    fn l1_put_then_get_is_a_hit() {
        // Directly exercises the L1 tier in isolation, mirroring what
        // `DistributedAuthCache::get` does on its fast path.
        let l1 = SecureMemoryCache::new();
        let record = sample_record("l1user");
        assert!(l1.put(&record.username, &record));
        let got: Option<UserRecord> = l1.get("l1user");
        assert_eq!(got.unwrap().username, "l1user");
    }

    #[test]
    fn region_is_assigned_when_directory_leaves_it_blank() {
        let mapper = RegionMapper::new();
        let mut record = sample_record("eu_jdoe");
        record.cache_region.clear();
        let region = mapper.assign(&record.username, Some(&record.email), Some(&record.distinguished_name));
        assert!(!region.is_empty());
    }
}
