//! Aggregated health across every pool and cache tier.

use crate::cache::distributed::CacheStatistics;
use crate::tls::pool_base::PoolStats;

/// Overall service health, reduced from per-pool success rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// Every backend pool is meeting its success-rate threshold.
    Up,
    /// At least one non-directory backend is unhealthy, but the directory
    /// (the system of record) is still reachable.
    Degraded,
    /// The directory itself is unhealthy; no tier can serve a cache miss.
    Down,
}

/// Success rate below this is considered unhealthy for the reducer.
pub const UNHEALTHY_THRESHOLD: f64 = 0.5;

/// A point-in-time snapshot of every pool's counters plus the cache's.
#[derive(Debug, Clone)]
pub struct ServiceSnapshot {
    /// L2 pool counters, if L2 is configured.
    pub kv_pool: Option<PoolSnapshot>,
    /// L3 pool counters, if L3 is configured.
    pub doc_pool: Option<PoolSnapshot>,
    /// L4 pool counters. Always present — the directory is mandatory.
    pub directory_pool: PoolSnapshot,
    /// Cache-tier hit/miss counters.
    pub cache: CacheStatistics,
}

/// One pool's counters, independent of which backend produced them.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    /// Total connection attempts recorded.
    pub attempts: u64,
    /// Total connection failures recorded.
    pub failures: u64,
    /// `successes / attempts`, or `1.0` with no attempts yet.
    pub success_rate: f64,
}

impl From<&PoolStats> for PoolSnapshot {
    fn from(stats: &PoolStats) -> Self {
        Self {
            attempts: stats.attempts(),
            failures: stats.failures(),
            success_rate: stats.success_rate(),
        }
    }
}

impl ServiceSnapshot {
    /// Reduce every pool's success rate into one overall [`Health`].
    ///
    /// The directory is load-bearing: if it falls below
    /// [`UNHEALTHY_THRESHOLD`] the whole service is `Down`, since a cache
    /// miss can no longer be filled. A degraded L2/L3 only demotes the
    /// result to `Degraded` — reads can still be served by whichever tier
    /// remains healthy.
    pub fn overall_health(&self) -> Health {
        if self.directory_pool.success_rate < UNHEALTHY_THRESHOLD {
            return Health::Down;
        }
        let optional_unhealthy = [&self.kv_pool, &self.doc_pool]
            .iter()
            .filter_map(|p| p.as_ref())
            .any(|p| p.success_rate < UNHEALTHY_THRESHOLD);
        if optional_unhealthy {
            Health::Degraded
        } else {
            Health::Up
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(directory_rate: f64, kv_rate: Option<f64>) -> ServiceSnapshot {
        ServiceSnapshot {
            kv_pool: kv_rate.map(|r| PoolSnapshot {
                attempts: 10,
                failures: 0,
                success_rate: r,
            }),
            doc_pool: None,
            directory_pool: PoolSnapshot {
                attempts: 10,
                failures: 0,
                success_rate: directory_rate,
            },
            cache: CacheStatistics::default(),
        }
    }

    #[test]
    fn all_healthy_is_up() {
        let snap = snapshot(1.0, Some(1.0));
        assert_eq!(snap.overall_health(), Health::Up);
    }

    #[test]
    fn unhealthy_optional_pool_is_degraded() {
        let snap = snapshot(1.0, Some(0.1));
        assert_eq!(snap.overall_health(), Health::Degraded);
    }

    #[test]
    fn unhealthy_directory_is_down_even_if_others_are_fine() {
        let snap = snapshot(0.1, Some(1.0));
        assert_eq!(snap.overall_health(), Health::Down);
    }

    #[test]
    fn no_optional_pools_configured_is_up_when_directory_is_healthy() {
        let snap = snapshot(1.0, None);
        assert_eq!(snap.overall_health(), Health::Up);
    }
}
