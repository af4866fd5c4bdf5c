//! Cache counters and statistics snapshots

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation counters kept by each cache
///
/// Counters live inside the owning cache's lock, so plain integers are
/// enough. They are never reset by `clear`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub writes: u64,
    pub deletes: u64,
}

impl CacheCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    /// Fraction of lookups that were hits, in `[0.0, 1.0]`
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics for a [`MemoryCache`](crate::MemoryCache)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
    /// `hits / (hits + misses)`, 0.0 before the first lookup
    pub hit_rate: f64,
    pub entry_count: usize,
    pub max_size: usize,
    /// Running total of entry sizes in bytes
    pub memory_bytes: usize,
    pub max_memory: usize,
    pub memory_usage_percent: f64,
    pub strategy: String,
}

impl fmt::Display for MemoryCacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Memory Cache ({}):\n  Hits: {}\n  Misses: {}\n  Hit Rate: {:.2}%\n  Evictions: {}\n  Expired: {}\n  Entries: {}/{}\n  Memory: {}/{} bytes ({:.2}%)",
            self.strategy,
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.evictions,
            self.expired,
            self.entry_count,
            self.max_size,
            self.memory_bytes,
            self.max_memory,
            self.memory_usage_percent
        )
    }
}

/// Statistics for a [`FileCache`](crate::FileCache)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub deletes: u64,
    pub hit_rate: f64,
    /// Number of value files currently on disk
    pub file_count: usize,
    pub max_files: usize,
    /// Bytes across all value files, recomputed from the directory
    pub total_size_bytes: u64,
    pub cache_dir: String,
}

impl fmt::Display for FileCacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File Cache ({}):\n  Hits: {}\n  Misses: {}\n  Hit Rate: {:.2}%\n  Writes: {}\n  Deletes: {}\n  Files: {}/{}\n  Size: {} bytes",
            self.cache_dir,
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.writes,
            self.deletes,
            self.file_count,
            self.max_files,
            self.total_size_bytes
        )
    }
}

/// Statistics for every sub-cache owned by a [`CacheManager`](crate::CacheManager)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManagerStats {
    pub memory_cache: MemoryCacheStats,
    pub file_cache: FileCacheStats,
    pub analysis_cache: MemoryCacheStats,
    pub session_cache: MemoryCacheStats,
}

impl fmt::Display for CacheManagerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[memory_cache] {}", self.memory_cache)?;
        writeln!(f, "[file_cache] {}", self.file_cache)?;
        writeln!(f, "[analysis_cache] {}", self.analysis_cache)?;
        write!(f, "[session_cache] {}", self.session_cache)
    }
}
