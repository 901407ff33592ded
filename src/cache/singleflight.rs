//! Fill coalescing: at most one in-flight directory lookup per key.
//!
//! Grounded on the DashMap-of-guards shape in
//! `enterprise::cache::lock::DistributedMutex`, but built for a different
//! purpose — that component serializes *access*, this one shares the
//! *result* of a single in-flight operation among every concurrent caller
//! for the same key, which calls for a broadcast-style future rather than a
//! mutual-exclusion lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

type FillOutcome<V> = crate::Result<Option<V>>;

/// Coalesces concurrent callers requesting the same key's fill into a
/// single in-flight operation.
pub struct SingleFlight<V: Clone + Send + 'static> {
    inflight: DashMap<String, broadcast::Sender<FillOutcome<V>>>,
    coalesced: std::sync::atomic::AtomicU64,
}

impl<V: Clone + Send + 'static> SingleFlight<V> {
    /// Build an empty coalescing map.
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
            coalesced: Default::default(),
        }
    }

    /// Run `fill` for `key`, or, if a fill for `key` is already in flight,
    /// wait for and share its result instead of starting a second one.
    ///
    /// The driving call's outcome — success, empty, or error — is broadcast
    /// verbatim to every joined caller: a backend outage must not look like
    /// "no such user" to the callers that happened to coalesce onto it.
    pub async fn run<F, Fut>(&self, key: &str, fill: F) -> FillOutcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = FillOutcome<V>>,
    {
        // Fast path: join an in-flight fill.
        if let Some(tx) = self.inflight.get(key) {
            let mut rx = tx.subscribe();
            drop(tx);
            self.coalesced.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return rx
                .recv()
                .await
                .unwrap_or_else(|_| Ok(None));
        }

        let (tx, _rx) = broadcast::channel(1);
        // Insert-or-join race: only the caller that wins the insert drives
        // the fill; a racing caller that lost falls back to the fast path.
        match self.inflight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let mut rx = existing.get().subscribe();
                self.coalesced.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return rx
                    .recv()
                    .await
                    .unwrap_or_else(|_| Ok(None));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(tx.clone());
            }
        }

        let result = fill().await;
        self.inflight.remove(key);
        let _ = tx.send(result.clone());
        result
    }

    /// How many callers joined an in-flight fill rather than starting one.
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// How many distinct keys have a fill in flight right now.
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}

impl<V: Clone + Send + 'static> Default for SingleFlight<V> {
    fn default() -> Self {
        Self::new()
    }
}
