//! Heuristic assignment of a user to exactly one region, memoized per
//! username.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A region code.
pub type RegionCode = &'static str;

/// One seeded region: its code and capacity.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    /// The region's code, e.g. `"US-EAST"`.
    pub code: RegionCode,
    /// Maximum load this region is provisioned for.
    pub capacity: u64,
}

/// The six seeded regions, in the tie-break order used by the
/// least-loaded-region fallback.
pub const REGIONS: &[Region] = &[
    Region { code: "US-EAST", capacity: 1_000_000 },
    Region { code: "US-WEST", capacity: 800_000 },
    Region { code: "EU-WEST", capacity: 600_000 },
    Region { code: "ASIA-PAC", capacity: 400_000 },
    Region { code: "CANADA", capacity: 200_000 },
    Region { code: "AUSTRALIA", capacity: 150_000 },
];

/// Assigns users to regions and memoizes the result for the life of the
/// process.
pub struct RegionMapper {
    memo: DashMap<String, RegionCode>,
    load: [AtomicU64; 6],
}

impl RegionMapper {
    /// Build a mapper with all regions at zero load.
    pub fn new() -> Self {
        Self {
            memo: DashMap::new(),
            load: Default::default(),
        }
    }

    /// Assign `username` a region using, in order: email domain suffix,
    /// distinguished-name substrings, username affixes, then the
    /// least-loaded region. The result is memoized.
    pub fn assign(&self, username: &str, email: Option<&str>, dn: Option<&str>) -> RegionCode {
        if let Some(region) = self.memo.get(username) {
            return *region;
        }

        let region = Self::by_email(email)
            .or_else(|| Self::by_dn(dn))
            .or_else(|| Self::by_username_affix(username))
            .unwrap_or_else(|| self.least_loaded());

        self.memo.insert(username.to_string(), region);
        self.bump_load(region);
        region
    }

    fn by_email(email: Option<&str>) -> Option<RegionCode> {
        let email = email?;
        let domain = email.rsplit('@').next()?.to_ascii_lowercase();
        let suffix = domain.rsplit('.').next()?;
        match suffix {
            "us" | "com" => Some("US-EAST"),
            "ca" => Some("CANADA"),
            "eu" | "de" | "fr" | "uk" | "nl" => Some("EU-WEST"),
            "au" => Some("AUSTRALIA"),
            "jp" | "sg" | "kr" => Some("ASIA-PAC"),
            _ => None,
        }
    }

    fn by_dn(dn: Option<&str>) -> Option<RegionCode> {
        let dn = dn?.to_ascii_lowercase();
        if dn.contains("ou=americas") || dn.contains("ou=usa") || dn.contains("c=us") {
            return Some("US-EAST");
        }
        if dn.contains("l=newyork") || dn.contains("l=chicago") {
            return Some("US-EAST");
        }
        if dn.contains("l=seattle") || dn.contains("l=portland") || dn.contains("l=losangeles") {
            return Some("US-WEST");
        }
        if dn.contains("ou=europe") || dn.contains("ou=emea") {
            return Some("EU-WEST");
        }
        if dn.contains("ou=asia") || dn.contains("ou=apac") {
            return Some("ASIA-PAC");
        }
        if dn.contains("ou=canada") {
            return Some("CANADA");
        }
        if dn.contains("ou=australia") || dn.contains("ou=oceania") {
            return Some("AUSTRALIA");
        }
        None
    }

    fn by_username_affix(username: &str) -> Option<RegionCode> {
        let lower = username.to_ascii_lowercase();
        const AFFIXES: &[(&str, RegionCode)] = &[
            ("us", "US-EAST"),
            ("eu", "EU-WEST"),
            ("asia", "ASIA-PAC"),
            ("ca", "CANADA"),
            ("au", "AUSTRALIA"),
        ];
        for (affix, region) in AFFIXES {
            if lower.starts_with(affix) || lower.ends_with(affix) {
                return Some(region);
            }
        }
        None
    }

    fn least_loaded(&self) -> RegionCode {
        REGIONS
            .iter()
            .enumerate()
            .min_by(|(i, a), (j, b)| {
                let load_a = self.load[*i].load(Ordering::Relaxed) as f64 / a.capacity as f64;
                let load_b = self.load[*j].load(Ordering::Relaxed) as f64 / b.capacity as f64;
                load_a
                    .partial_cmp(&load_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.capacity.cmp(&b.capacity))
            })
            .map(|(_, region)| region.code)
            .unwrap_or("US-EAST")
    }

    fn bump_load(&self, region: RegionCode) {
        if let Some(idx) = REGIONS.iter().position(|r| r.code == region) {
            self.load[idx].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Clear all memoized assignments and load counters. For tests only —
    /// production code relies on the mapper's unbounded per-process memo.
    pub fn clear(&self) {
        self.memo.clear();
        for counter in &self.load {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for RegionMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_domain_suffix_wins_first() {
        let mapper = RegionMapper::new();
        let region = mapper.assign("xyz", Some("a@b.jp"), None);
        assert_eq!(region, "ASIA-PAC");
    }

    #[test]
    fn dn_substring_maps_to_eu_west() {
        let mapper = RegionMapper::new();
        let region = mapper.assign("eu_jdoe", None, Some("uid=jdoe,ou=Europe,dc=x"));
        assert_eq!(region, "EU-WEST");
    }

    #[test]
    fn assignment_is_deterministic_and_memoized() {
        let mapper = RegionMapper::new();
        let first = mapper.assign("eu_jdoe", None, Some("uid=jdoe,ou=Europe,dc=x"));
        let second = mapper.assign("eu_jdoe", Some("nomatch@nowhere.zz"), None);
        assert_eq!(first, second);
    }

    #[test]
    fn no_hints_falls_back_to_least_loaded() {
        let mapper = RegionMapper::new();
        let region = mapper.assign("unhintable", None, None);
        assert_eq!(region, "AUSTRALIA");
    }
}
