//! Eviction strategies for the in-memory tier
//!
//! A strategy is a stateless policy: given the current entry set it picks
//! the keys to drop when an incoming write does not fit. Each pass targets a
//! quarter of the entries. The TTL strategy additionally drops every expired
//! entry regardless of that quota.

use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};

use crate::entry::CacheEntry;

/// Eviction policy used by a [`MemoryCache`](crate::MemoryCache)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Least recently used: oldest `accessed_at` first
    #[default]
    Lru,
    /// Least frequently used: lowest `access_count` first
    Lfu,
    /// Expired entries first, then oldest `created_at`
    Ttl,
}

impl EvictionStrategy {
    /// Select the keys to evict so that an entry of `incoming_size` bytes can be stored
    ///
    /// Returns an empty list only when `entries` is empty.
    pub fn select_victims(
        &self,
        entries: &HashMap<String, CacheEntry>,
        incoming_size: usize,
    ) -> Vec<String> {
        let quota = eviction_quota(entries.len());
        tracing::trace!(
            strategy = self.name(),
            entries = entries.len(),
            incoming_size,
            quota,
            "Selecting eviction victims"
        );

        match self {
            EvictionStrategy::Lru => lowest_by(entries, quota, |a, b| {
                a.accessed_at.cmp(&b.accessed_at)
            }),
            EvictionStrategy::Lfu => lowest_by(entries, quota, |a, b| {
                a.access_count.cmp(&b.access_count)
            }),
            EvictionStrategy::Ttl => {
                let (expired, live): (Vec<&CacheEntry>, Vec<&CacheEntry>) =
                    entries.values().partition(|entry| entry.is_expired());

                let mut victims: Vec<String> =
                    expired.iter().map(|entry| entry.key.clone()).collect();

                if victims.len() < quota {
                    let mut live = live;
                    live.sort_by(|a, b| {
                        a.created_at
                            .cmp(&b.created_at)
                            .then(a.sequence.cmp(&b.sequence))
                    });
                    victims.extend(
                        live.into_iter()
                            .take(quota - victims.len())
                            .map(|entry| entry.key.clone()),
                    );
                }
                victims
            }
        }
    }

    /// Strategy name for logging and stats
    pub fn name(&self) -> &'static str {
        match self {
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Lfu => "lfu",
            EvictionStrategy::Ttl => "ttl",
        }
    }
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of entries a single eviction pass removes
///
/// A quarter of the entries, but never zero for a non-empty cache.
pub fn eviction_quota(entry_count: usize) -> usize {
    if entry_count == 0 {
        0
    } else {
        (entry_count / 4).max(1)
    }
}

fn lowest_by<F>(entries: &HashMap<String, CacheEntry>, quota: usize, mut compare: F) -> Vec<String>
where
    F: FnMut(&CacheEntry, &CacheEntry) -> Ordering,
{
    let mut ordered: Vec<&CacheEntry> = entries.values().collect();
    ordered.sort_by(|a, b| compare(a, b).then(a.sequence.cmp(&b.sequence)));
    ordered
        .into_iter()
        .take(quota)
        .map(|entry| entry.key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;

    fn entries(keys: &[&str]) -> HashMap<String, CacheEntry> {
        keys.iter()
            .enumerate()
            .map(|(i, key)| {
                let mut entry = CacheEntry::new(*key, serde_json::json!(i), None, 8);
                entry.sequence = i as u64;
                (key.to_string(), entry)
            })
            .collect()
    }

    #[test]
    fn test_quota_is_a_quarter() {
        assert_eq!(eviction_quota(0), 0);
        assert_eq!(eviction_quota(1), 1);
        assert_eq!(eviction_quota(4), 1);
        assert_eq!(eviction_quota(8), 2);
        assert_eq!(eviction_quota(1000), 250);
    }

    #[test]
    fn test_empty_set_evicts_nothing() {
        for strategy in [EvictionStrategy::Lru, EvictionStrategy::Lfu, EvictionStrategy::Ttl] {
            assert!(strategy.select_victims(&HashMap::new(), 10).is_empty());
        }
    }

    #[test]
    fn test_lru_strategy() {
        let mut set = entries(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let later = Utc::now() + chrono::Duration::seconds(5);
        set.get_mut("a").unwrap().accessed_at = later;
        set.get_mut("b").unwrap().accessed_at = later;

        let victims = EvictionStrategy::Lru.select_victims(&set, 8);
        assert_eq!(victims.len(), 2);
        assert!(!victims.contains(&"a".to_string()));
        assert!(!victims.contains(&"b".to_string()));
    }

    #[test]
    fn test_lru_ties_follow_insertion_order() {
        let mut set = entries(&["a", "b", "c", "d"]);
        let same = Utc::now();
        for entry in set.values_mut() {
            entry.accessed_at = same;
        }
        assert_eq!(EvictionStrategy::Lru.select_victims(&set, 8), vec!["a".to_string()]);
    }

    #[test]
    fn test_lfu_strategy() {
        let mut set = entries(&["a", "b", "c", "d"]);
        set.get_mut("a").unwrap().access_count = 3;
        set.get_mut("b").unwrap().access_count = 1;
        set.get_mut("c").unwrap().access_count = 2;
        set.get_mut("d").unwrap().access_count = 5;

        assert_eq!(EvictionStrategy::Lfu.select_victims(&set, 8), vec!["b".to_string()]);
    }

    #[test]
    fn test_ttl_strategy_drops_every_expired_entry() {
        let mut set = entries(&["a", "b", "c", "d"]);
        let past = Utc::now() - chrono::Duration::seconds(10);
        for key in ["b", "c", "d"] {
            let entry = set.get_mut(key).unwrap();
            entry.created_at = past;
            entry.ttl = Some(Duration::from_secs(1));
        }

        let mut victims = EvictionStrategy::Ttl.select_victims(&set, 8);
        victims.sort();
        // three victims even though the quota for four entries is one
        assert_eq!(victims, vec!["b".to_string(), "c".to_string(), "d".to_string()]);
    }

    #[test]
    fn test_ttl_strategy_tops_up_with_oldest() {
        let mut set = entries(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let base = Utc::now() - chrono::Duration::seconds(100);
        for (offset, key) in ["a", "b", "c", "d", "e", "f", "g", "h"].iter().enumerate() {
            set.get_mut(*key).unwrap().created_at = base + chrono::Duration::seconds(offset as i64);
        }
        let expired = set.get_mut("h").unwrap();
        expired.ttl = Some(Duration::from_secs(1));

        let victims = EvictionStrategy::Ttl.select_victims(&set, 8);
        assert_eq!(victims, vec!["h".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_strategy_names_round_trip_through_serde() {
        let parsed: EvictionStrategy = serde_json::from_str("\"lfu\"").unwrap();
        assert_eq!(parsed, EvictionStrategy::Lfu);
        assert_eq!(serde_json::to_string(&EvictionStrategy::Ttl).unwrap(), "\"ttl\"");
        assert_eq!(EvictionStrategy::default().to_string(), "lru");
    }
}
