//! Namespaced façade over the memory and file caches

use std::{fmt, str::FromStr, time::Duration};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::{
    config::CacheSettings,
    error::{CacheError, CacheResult},
    metrics::CacheManagerStats,
    storage::{FileCache, MemoryCache},
};

/// Logical cache type a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheType {
    /// General in-memory cache, unprefixed
    #[default]
    Memory,
    /// General on-disk cache, unprefixed
    File,
    /// Analysis results, stored in the analysis cache under `analysis:`
    Analysis,
    /// Session state, stored in the session cache under `session:`
    Session,
    /// `user:` namespace; no sub-cache is registered for it
    User,
    /// `config:` namespace; no sub-cache is registered for it
    Config,
}

impl CacheType {
    /// Every known cache type
    pub const ALL: [CacheType; 6] = [
        CacheType::Memory,
        CacheType::File,
        CacheType::Analysis,
        CacheType::Session,
        CacheType::User,
        CacheType::Config,
    ];

    /// Prefix prepended to keys of this type
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheType::Memory | CacheType::File => "",
            CacheType::Analysis => "analysis:",
            CacheType::Session => "session:",
            CacheType::User => "user:",
            CacheType::Config => "config:",
        }
    }

    /// Key as stored in the underlying cache
    pub fn namespaced_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix(), key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::Memory => "memory",
            CacheType::File => "file",
            CacheType::Analysis => "analysis",
            CacheType::Session => "session",
            CacheType::User => "user",
            CacheType::Config => "config",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheType::ALL
            .into_iter()
            .find(|cache_type| cache_type.as_str() == s)
            .ok_or_else(|| CacheError::UnknownCacheType(s.to_string()))
    }
}

/// Sub-cache a cache type is routed to
enum Route<'a> {
    Memory(&'a MemoryCache),
    File(&'a FileCache),
}

/// Owns the four sub-caches and routes namespaced keys to them
///
/// The manager holds no lock of its own; each sub-cache serializes its own
/// operations, so calls for different cache types never contend.
pub struct CacheManager {
    settings: CacheSettings,
    memory_cache: MemoryCache,
    file_cache: FileCache,
    analysis_cache: MemoryCache,
    session_cache: MemoryCache,
}

impl CacheManager {
    /// Create a manager and all of its sub-caches
    ///
    /// # Errors
    ///
    /// Returns error if the settings are invalid or the file cache directory
    /// cannot be created
    pub fn new(settings: CacheSettings) -> CacheResult<Self> {
        settings.validate()?;

        let file_cache = FileCache::new(settings.file_config())?;
        let manager = Self {
            memory_cache: MemoryCache::new(settings.memory_config()),
            file_cache,
            analysis_cache: MemoryCache::new(settings.analysis_config()),
            session_cache: MemoryCache::new(settings.session_config()),
            settings,
        };

        debug!(
            "Cache manager ready (file cache at {})",
            manager.settings.file_cache_dir.display()
        );
        Ok(manager)
    }

    /// Settings this manager was built from
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn memory_cache(&self) -> &MemoryCache {
        &self.memory_cache
    }

    pub fn file_cache(&self) -> &FileCache {
        &self.file_cache
    }

    pub fn analysis_cache(&self) -> &MemoryCache {
        &self.analysis_cache
    }

    pub fn session_cache(&self) -> &MemoryCache {
        &self.session_cache
    }

    fn route(&self, cache_type: CacheType) -> Option<Route<'_>> {
        match cache_type {
            CacheType::Memory => Some(Route::Memory(&self.memory_cache)),
            CacheType::File => Some(Route::File(&self.file_cache)),
            CacheType::Analysis => Some(Route::Memory(&self.analysis_cache)),
            CacheType::Session => Some(Route::Memory(&self.session_cache)),
            CacheType::User | CacheType::Config => {
                warn!("No cache registered for cache type: {}", cache_type);
                None
            }
        }
    }

    /// Retrieve a value of the given type
    pub fn get<T: DeserializeOwned>(&self, key: &str, cache_type: CacheType) -> Option<T> {
        let key = cache_type.namespaced_key(key);
        match self.route(cache_type)? {
            Route::Memory(cache) => cache.get(&key),
            Route::File(cache) => cache.get(&key),
        }
    }

    /// Retrieve a value or fall back to `default`
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, cache_type: CacheType, default: T) -> T {
        self.get(key, cache_type).unwrap_or(default)
    }

    /// Store a value
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        cache_type: CacheType,
        ttl: Option<Duration>,
    ) -> bool {
        let key = cache_type.namespaced_key(key);
        match self.route(cache_type) {
            Some(Route::Memory(cache)) => cache.set(&key, value, ttl),
            Some(Route::File(cache)) => cache.set(&key, value, ttl),
            None => false,
        }
    }

    /// Remove a value
    pub fn delete(&self, key: &str, cache_type: CacheType) -> bool {
        let key = cache_type.namespaced_key(key);
        match self.route(cache_type) {
            Some(Route::Memory(cache)) => cache.delete(&key),
            Some(Route::File(cache)) => cache.delete(&key),
            None => false,
        }
    }

    /// Clear one sub-cache, or all of them when `cache_type` is `None`
    pub fn clear(&self, cache_type: Option<CacheType>) {
        match cache_type {
            None => {
                self.memory_cache.clear();
                self.file_cache.clear();
                self.analysis_cache.clear();
                self.session_cache.clear();
                debug!("Cleared all caches");
            }
            Some(cache_type) => match self.route(cache_type) {
                Some(Route::Memory(cache)) => cache.clear(),
                Some(Route::File(cache)) => cache.clear(),
                None => {}
            },
        }
    }

    /// Remove expired entries from every sub-cache
    pub fn cleanup_expired(&self) -> usize {
        self.memory_cache.cleanup_expired()
            + self.file_cache.cleanup_expired()
            + self.analysis_cache.cleanup_expired()
            + self.session_cache.cleanup_expired()
    }

    /// Retrieve a cached analysis result
    pub fn get_analysis_result<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key, CacheType::Analysis)
    }

    /// Cache an analysis result
    pub fn cache_analysis_result<T: Serialize + ?Sized>(
        &self,
        key: &str,
        result: &T,
        ttl: Option<Duration>,
    ) -> bool {
        self.set(key, result, CacheType::Analysis, ttl)
    }

    /// Retrieve cached session state
    pub fn get_session_state<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key, CacheType::Session)
    }

    /// Cache session state
    pub fn cache_session_state<T: Serialize + ?Sized>(
        &self,
        key: &str,
        state: &T,
        ttl: Option<Duration>,
    ) -> bool {
        self.set(key, state, CacheType::Session, ttl)
    }

    /// Statistics for every sub-cache
    pub fn get_stats(&self) -> CacheManagerStats {
        CacheManagerStats {
            memory_cache: self.memory_cache.get_stats(),
            file_cache: self.file_cache.get_stats(),
            analysis_cache: self.analysis_cache.get_stats(),
            session_cache: self.session_cache.get_stats(),
        }
    }
}
