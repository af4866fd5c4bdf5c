//! Bounded in-process cache

use std::{collections::HashMap, time::Duration};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::{
    entry::{CacheEntry, CachedValue},
    metrics::{CacheCounters, MemoryCacheStats},
    sizing::estimate_size,
    strategy::EvictionStrategy,
};

/// Memory cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries
    pub max_size: usize,
    /// Maximum total size in bytes
    pub max_memory: usize,
    /// TTL applied when `set` is called without one
    pub default_ttl: Option<Duration>,
    /// Eviction policy used when a write does not fit
    pub strategy: EvictionStrategy,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            max_memory: 100 * 1024 * 1024, // 100MB
            default_ttl: Some(Duration::from_secs(3600)),
            strategy: EvictionStrategy::Lru,
        }
    }
}

impl MemoryCacheConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_memory(mut self, max_memory: usize) -> Self {
        self.max_memory = max_memory;
        self
    }

    pub fn with_default_ttl(mut self, default_ttl: Option<Duration>) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    pub fn with_strategy(mut self, strategy: EvictionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    current_memory: usize,
    next_sequence: u64,
    counters: CacheCounters,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.current_memory = self.current_memory.saturating_sub(entry.size);
        Some(entry)
    }

    fn sweep_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
            self.counters.record_expiration();
        }

        if !expired.is_empty() {
            debug!("Swept {} expired entries", expired.len());
        }
        expired.len()
    }
}

/// In-memory cache bounded by entry count and an estimated byte budget
///
/// Every operation, including the expiry sweep that precedes reads, runs
/// under a single mutex.
pub struct MemoryCache {
    config: MemoryCacheConfig,
    state: Mutex<MemoryState>,
}

impl MemoryCache {
    /// Create a new memory cache
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MemoryState {
                entries: HashMap::new(),
                current_memory: 0,
                next_sequence: 0,
                counters: CacheCounters::default(),
            }),
        }
    }

    /// Get cache configuration
    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    /// Eviction strategy in use
    pub fn strategy(&self) -> EvictionStrategy {
        self.config.strategy
    }

    /// Retrieve the JSON form of a value, `None` on a miss or an expired entry
    ///
    /// Entries held in binary form have no JSON form and read as misses here.
    pub fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        self.lookup(key, |value| match value.as_json() {
            Some(json) => Some(json.clone()),
            None => {
                warn!("Cached value for key {} has no JSON form", key);
                None
            }
        })
    }

    /// Retrieve a value decoded as `T`
    ///
    /// A stored value that does not decode as `T` is logged and counted as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key, |value| match value.decode() {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Cached value for key {} has an unexpected shape: {}", key, e);
                None
            }
        })
    }

    /// Sweep, then read a live entry through `read`
    ///
    /// Only a read that produces a value counts as a hit and touches the entry.
    fn lookup<R>(&self, key: &str, read: impl FnOnce(&CachedValue) -> Option<R>) -> Option<R> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.sweep_expired();

        let expired = match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                let value = read(&entry.value);
                if value.is_some() {
                    entry.touch();
                    state.counters.record_hit();
                    debug!("Cache hit for key: {}", key);
                } else {
                    state.counters.record_miss();
                }
                return value;
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.remove(key);
            state.counters.record_expiration();
            debug!("Cache expired for key: {}", key);
        } else {
            state.counters.record_miss();
            debug!("Cache miss for key: {}", key);
        }
        None
    }

    /// Retrieve a value or fall back to `default`
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Store a value
    ///
    /// Values without a JSON form are kept in binary form. Returns `false` if
    /// the value cannot be encoded at all or is larger than the whole memory
    /// budget.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        self.set_with_metadata(key, value, ttl, HashMap::new())
    }

    /// Store a value with caller metadata attached to its entry
    pub fn set_with_metadata<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> bool {
        let size = estimate_size(value);
        match CachedValue::encode(value) {
            Ok(encoded) => self.insert_value(key, encoded, size, ttl, metadata),
            Err(e) => {
                warn!("Failed to encode value for key {}: {}", key, e);
                false
            }
        }
    }

    /// Store an already-encoded value
    pub fn set_value(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> bool {
        let size = estimate_size(&value);
        self.insert_value(key, CachedValue::Json(value), size, ttl, HashMap::new())
    }

    fn insert_value(
        &self,
        key: &str,
        value: CachedValue,
        size: usize,
        ttl: Option<Duration>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> bool {
        if size > self.config.max_memory {
            warn!(
                "Value for key {} is {} bytes, larger than the {} byte budget",
                key, size, self.config.max_memory
            );
            return false;
        }

        let max_size = self.config.max_size.max(1);
        let mut state = self.state.lock();
        state.remove(key);

        while !state.entries.is_empty()
            && (state.entries.len() >= max_size
                || state.current_memory + size > self.config.max_memory)
        {
            let victims = self.config.strategy.select_victims(&state.entries, size);
            debug!(
                "Evicting {} entries with {} strategy",
                victims.len(),
                self.config.strategy
            );
            for victim in victims {
                if state.remove(&victim).is_some() {
                    state.counters.record_eviction();
                }
            }
        }

        let ttl = ttl.filter(|t| !t.is_zero()).or(self.config.default_ttl);
        let mut entry = CacheEntry::new(key, value, ttl, size).with_metadata(metadata);
        entry.sequence = state.next_sequence;
        state.next_sequence += 1;

        state.current_memory += size;
        state.entries.insert(key.to_string(), entry);
        state.counters.record_write();
        debug!("Cached value for key: {} ({} bytes)", key, size);
        true
    }

    /// Remove an entry, returning whether it existed
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.remove(key).is_some();
        if removed {
            state.counters.record_delete();
            debug!("Deleted cache entry: {}", key);
        }
        removed
    }

    /// Remove every entry; counters are kept
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.current_memory = 0;
        debug!("Cleared all memory cache entries");
    }

    /// Keys of all live entries
    pub fn keys(&self) -> Vec<String> {
        let mut state = self.state.lock();
        state.sweep_expired();
        state.entries.keys().cloned().collect()
    }

    /// Check for a live entry without counting a hit or miss
    pub fn contains(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.sweep_expired();
        state.entries.contains_key(key)
    }

    /// Copy of an entry without touching it
    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Remove expired entries now, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        self.state.lock().sweep_expired()
    }

    /// Number of stored entries, including ones not yet swept
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Running total of entry sizes
    pub fn memory_bytes(&self) -> usize {
        self.state.lock().current_memory
    }

    /// Get cache statistics
    pub fn get_stats(&self) -> MemoryCacheStats {
        let state = self.state.lock();
        let memory_usage_percent = if self.config.max_memory == 0 {
            0.0
        } else {
            state.current_memory as f64 / self.config.max_memory as f64 * 100.0
        };

        MemoryCacheStats {
            hits: state.counters.hits,
            misses: state.counters.misses,
            evictions: state.counters.evictions,
            expired: state.counters.expirations,
            hit_rate: state.counters.hit_rate(),
            entry_count: state.entries.len(),
            max_size: self.config.max_size,
            memory_bytes: state.current_memory,
            max_memory: self.config.max_memory,
            memory_usage_percent,
            strategy: self.config.strategy.to_string(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::sizing::FALLBACK_SIZE;

    fn small_cache(max_size: usize, strategy: EvictionStrategy) -> MemoryCache {
        MemoryCache::new(
            MemoryCacheConfig::default()
                .with_max_size(max_size)
                .with_default_ttl(None)
                .with_strategy(strategy),
        )
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = MemoryCache::default();

        assert!(cache.set("key1", "value1", None));
        assert_eq!(cache.get::<String>("key1"), Some("value1".to_string()));
        assert!(cache.contains("key1"));
        assert!(!cache.contains("key2"));

        assert!(cache.delete("key1"));
        assert!(!cache.delete("key1"));
        assert_eq!(cache.get::<String>("key1"), None);
    }

    #[test]
    fn test_hit_miss_accounting() {
        let cache = MemoryCache::default();
        cache.set("k", &1, None);

        assert_eq!(cache.get::<i64>("k"), Some(1));
        assert_eq!(cache.get::<i64>("k"), Some(1));
        assert_eq!(cache.get::<i64>("missing"), None);

        let stats = cache.get_stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_get_or_returns_default() {
        let cache = MemoryCache::default();
        assert_eq!(cache.get_or("absent", 42), 42);
    }

    #[test]
    fn test_lru_evicts_least_recently_touched() {
        let cache = small_cache(4, EvictionStrategy::Lru);
        for key in ["a", "b", "c", "d"] {
            cache.set(key, key, None);
        }
        assert_eq!(cache.get::<String>("a"), Some("a".to_string()));

        cache.set("e", "e", None);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("e"));
        assert_eq!(cache.get_stats().evictions, 1);
    }

    #[test]
    fn test_lfu_evicts_least_frequently_read() {
        let cache = small_cache(4, EvictionStrategy::Lfu);
        for key in ["a", "b", "c", "d"] {
            cache.set(key, key, None);
        }
        for key in ["a", "b", "d"] {
            cache.get::<String>(key);
        }

        cache.set("e", "e", None);
        assert!(!cache.contains("c"));
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_overwrite_frees_old_bytes() {
        let cache = MemoryCache::new(MemoryCacheConfig::default().with_max_memory(100));
        assert!(cache.set("k", &"a".repeat(60), None));
        assert!(cache.set("k", &"b".repeat(70), None));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.memory_bytes(), 70);
        assert_eq!(cache.get_stats().evictions, 0);
    }

    #[test]
    fn test_oversized_value_is_refused() {
        let cache = MemoryCache::new(MemoryCacheConfig::default().with_max_memory(100));
        assert!(!cache.set("k", &"a".repeat(1000), None));
        assert!(cache.is_empty());
        assert_eq!(cache.memory_bytes(), 0);
    }

    #[test]
    fn test_byte_budget_triggers_eviction() {
        let cache = MemoryCache::new(
            MemoryCacheConfig::default()
                .with_max_memory(100)
                .with_default_ttl(None),
        );
        for key in ["a", "b", "c", "d"] {
            assert!(cache.set(key, &"x".repeat(25), None));
        }
        assert_eq!(cache.memory_bytes(), 100);

        assert!(cache.set("e", &"y".repeat(10), None));
        assert!(cache.memory_bytes() <= 100);
        assert!(!cache.contains("a"));
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_removed() {
        let cache = MemoryCache::default();
        cache.set("short", "value", Some(Duration::from_millis(50)));
        assert_eq!(cache.get::<String>("short"), Some("value".to_string()));

        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(cache.get::<String>("short"), None);
        assert!(cache.peek_entry("short").is_none());
        assert_eq!(cache.get_stats().expired, 1);
    }

    #[test]
    fn test_reads_do_not_slide_expiry() {
        let cache = MemoryCache::default();
        cache.set("k", "v", Some(Duration::from_secs(60)));
        let created = cache.peek_entry("k").unwrap().created_at;

        for _ in 0..3 {
            cache.get::<String>("k");
        }

        let entry = cache.peek_entry("k").unwrap();
        assert_eq!(entry.created_at, created);
        assert_eq!(entry.access_count, 3);
    }

    #[test]
    fn test_default_ttl_applies_when_none_given() {
        let cache = MemoryCache::new(
            MemoryCacheConfig::default().with_default_ttl(Some(Duration::from_secs(30))),
        );
        cache.set("a", "v", None);
        cache.set("b", "v", Some(Duration::ZERO));
        cache.set("c", "v", Some(Duration::from_secs(5)));

        assert_eq!(cache.peek_entry("a").unwrap().ttl, Some(Duration::from_secs(30)));
        assert_eq!(cache.peek_entry("b").unwrap().ttl, Some(Duration::from_secs(30)));
        assert_eq!(cache.peek_entry("c").unwrap().ttl, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = MemoryCache::default();
        cache.set("k", "v", None);
        cache.get::<String>("k");

        cache.clear();
        cache.clear();

        assert!(cache.keys().is_empty());
        assert_eq!(cache.memory_bytes(), 0);
        assert_eq!(cache.get_stats().hits, 1);
    }

    #[test]
    fn test_metadata_is_stored_untouched() {
        let cache = MemoryCache::default();
        let mut metadata = HashMap::new();
        metadata.insert("origin".to_string(), json!({"node": "transcribe"}));
        assert!(cache.set_with_metadata("k", &json!([1, 2, 3]), None, metadata.clone()));

        assert_eq!(cache.peek_entry("k").unwrap().metadata, metadata);
    }

    #[test]
    fn test_mismatched_type_is_a_miss() {
        let cache = MemoryCache::default();
        cache.set("k", "text", None);
        assert_eq!(cache.get::<u32>("k"), None);

        let stats = cache.get_stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(cache.peek_entry("k").unwrap().access_count, 0);
    }

    #[test]
    fn test_byte_buffers_are_charged_their_length() {
        let cache = MemoryCache::new(MemoryCacheConfig::default().with_max_memory(1000));
        let audio = vec![7u8; 500];

        assert!(cache.set("audio", &audio, None));
        assert_eq!(cache.memory_bytes(), 500);
        assert_eq!(cache.get::<Vec<u8>>("audio"), Some(audio));
    }

    #[test]
    fn test_values_without_json_form_are_kept() {
        let cache = MemoryCache::default();
        let mut pairs: HashMap<(u8, u8), u8> = HashMap::new();
        pairs.insert((1, 2), 3);
        pairs.insert((4, 5), 6);

        assert!(cache.set("pairs", &pairs, None));
        let entry = cache.peek_entry("pairs").unwrap();
        assert_eq!(entry.size, FALLBACK_SIZE);
        assert!(matches!(entry.value, CachedValue::Encoded(_)));

        assert_eq!(cache.get::<HashMap<(u8, u8), u8>>("pairs"), Some(pairs));
        assert_eq!(cache.get_value("pairs"), None);
        assert_eq!(cache.get_stats().hits, 1);
        assert_eq!(cache.get_stats().misses, 1);
    }

    #[test]
    fn test_stats_report_memory_usage() {
        let cache = MemoryCache::new(MemoryCacheConfig::default().with_max_memory(200));
        cache.set("k", &"a".repeat(50), None);

        let stats = cache.get_stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.memory_bytes, 50);
        assert!((stats.memory_usage_percent - 25.0).abs() < 1e-9);
        assert_eq!(stats.strategy, "lru");
    }
}
