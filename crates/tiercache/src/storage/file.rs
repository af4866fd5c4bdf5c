//! Disk-backed cache with JSON metadata sidecars
//!
//! Each entry is a pair of files named by the MD5 hex digest of its key:
//! `{hash}.cache` holds the encoded value and `{hash}.meta` holds a JSON
//! [`FileEntryMetadata`]. Entries survive process restarts. When the number
//! of value files reaches `max_files`, the oldest files by modification time
//! are removed before the next write.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{CacheError, CacheResult, IoOperation},
    metrics::{CacheCounters, FileCacheStats},
};

const VALUE_EXTENSION: &str = "cache";
const META_EXTENSION: &str = "meta";

/// File cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FileCacheConfig {
    /// Directory holding the cache files
    pub cache_dir: PathBuf,
    /// Maximum number of value files
    pub max_files: usize,
    /// TTL applied when `set` is called without one
    pub default_ttl: Option<Duration>,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            max_files: 1000,
            default_ttl: Some(Duration::from_secs(86400)), // 24 hours
        }
    }
}

impl FileCacheConfig {
    /// Create a config for the given directory with default limits
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_default_ttl(mut self, default_ttl: Option<Duration>) -> Self {
        self.default_ttl = default_ttl;
        self
    }
}

/// Contents of a `.meta` sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntryMetadata {
    /// Original (unhashed) cache key
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub access_count: u64,
    /// Time to live in seconds
    pub ttl: Option<f64>,
    /// Size of the value file in bytes
    pub size: u64,
}

impl FileEntryMetadata {
    /// Same rule as [`CacheEntry::is_expired`](crate::CacheEntry::is_expired)
    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => {
                let age = Utc::now().signed_duration_since(self.created_at);
                age.num_milliseconds() as f64 / 1000.0 > ttl
            }
            None => false,
        }
    }
}

/// Disk-backed cache
///
/// All operations are serialized through one mutex. The directory is assumed
/// to be owned by a single process.
pub struct FileCache {
    config: FileCacheConfig,
    /// Holding this guard also serializes access to the directory
    counters: Mutex<CacheCounters>,
}

impl FileCache {
    /// Create a new file cache, creating its directory if needed
    ///
    /// # Errors
    ///
    /// Returns error if the cache directory cannot be created
    pub fn new(config: FileCacheConfig) -> CacheResult<Self> {
        let cache_dir = &config.cache_dir;
        if !cache_dir.exists() {
            fs::create_dir_all(cache_dir)
                .map_err(|e| CacheError::directory_creation_failed(cache_dir.clone(), e))?;
            debug!("Created cache directory: {}", cache_dir.display());
        }

        Ok(Self {
            config,
            counters: Mutex::new(CacheCounters::default()),
        })
    }

    /// Create a file cache in `cache_dir` with default limits
    pub fn open(cache_dir: impl Into<PathBuf>) -> CacheResult<Self> {
        Self::new(FileCacheConfig::new(cache_dir))
    }

    /// Get cache configuration
    pub fn config(&self) -> &FileCacheConfig {
        &self.config
    }

    /// Directory holding the cache files
    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    /// Retrieve a value decoded as `T`
    ///
    /// Missing, expired, unreadable, or undecodable entries are all misses.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut counters = self.counters.lock();
        match self.read_entry(key) {
            Ok(Some(value)) => {
                counters.record_hit();
                debug!("Cache hit for key: {}", key);
                Some(value)
            }
            Ok(None) => {
                counters.record_miss();
                debug!("Cache miss for key: {}", key);
                None
            }
            Err(e) => {
                counters.record_miss();
                warn!("Failed to read cache entry for key {}: {}", key, e);
                None
            }
        }
    }

    /// Retrieve a value or fall back to `default`
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Store a value, returning `false` if it could not be written
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let mut counters = self.counters.lock();
        match self.write_entry(key, value, ttl) {
            Ok(size) => {
                counters.record_write();
                debug!("Cached value for key: {} ({} bytes)", key, size);
                true
            }
            Err(e) => {
                warn!("Failed to write cache entry for key {}: {}", key, e);
                false
            }
        }
    }

    /// Remove an entry, returning whether any of its files existed
    pub fn delete(&self, key: &str) -> bool {
        let mut counters = self.counters.lock();
        let (value_path, meta_path) = self.entry_paths(key);

        match remove_pair(&value_path, &meta_path) {
            Ok(removed) => {
                if removed {
                    counters.record_delete();
                    debug!("Deleted cache entry: {}", key);
                }
                removed
            }
            Err(e) => {
                warn!("Failed to delete cache entry for key {}: {}", key, e);
                false
            }
        }
    }

    /// Remove every `.cache` and `.meta` file in the cache directory
    pub fn clear(&self) {
        let _counters = self.counters.lock();
        let files = match self.list_files(&[VALUE_EXTENSION, META_EXTENSION]) {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list cache directory: {}", e);
                return;
            }
        };

        for path in &files {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove cache file {}: {}", path.display(), e);
            }
        }
        debug!("Cleared {} cache files", files.len());
    }

    /// Check for a live entry without counting a hit or miss
    pub fn contains(&self, key: &str) -> bool {
        let _counters = self.counters.lock();
        let (value_path, meta_path) = self.entry_paths(key);
        if !value_path.exists() || !meta_path.exists() {
            return false;
        }
        read_metadata(&meta_path)
            .map(|metadata| !metadata.is_expired())
            .unwrap_or(false)
    }

    /// Remove every expired entry, returning how many were removed
    ///
    /// Pairs whose sidecar cannot be parsed are removed as well.
    pub fn cleanup_expired(&self) -> usize {
        let _counters = self.counters.lock();
        let sidecars = match self.list_files(&[META_EXTENSION]) {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list cache directory: {}", e);
                return 0;
            }
        };

        let mut cleaned = 0;
        for meta_path in sidecars {
            let stale = match read_metadata(&meta_path) {
                Ok(metadata) => metadata.is_expired(),
                Err(e) => {
                    warn!("Unreadable cache metadata {}: {}", meta_path.display(), e);
                    true
                }
            };
            if !stale {
                continue;
            }

            let value_path = meta_path.with_extension(VALUE_EXTENSION);
            match remove_pair(&value_path, &meta_path) {
                Ok(_) => {
                    cleaned += 1;
                    debug!("Cleaned up expired cache entry: {}", meta_path.display());
                }
                Err(e) => warn!("Failed to remove expired cache entry: {}", e),
            }
        }

        debug!("Cleaned up {} expired cache entries", cleaned);
        cleaned
    }

    /// Get cache statistics
    pub fn get_stats(&self) -> FileCacheStats {
        let counters = self.counters.lock();
        let (file_count, total_size_bytes) = match self.list_files(&[VALUE_EXTENSION]) {
            Ok(files) => {
                let total = files
                    .iter()
                    .filter_map(|path| fs::metadata(path).ok())
                    .map(|metadata| metadata.len())
                    .sum();
                (files.len(), total)
            }
            Err(e) => {
                warn!("Failed to list cache directory: {}", e);
                (0, 0)
            }
        };

        FileCacheStats {
            hits: counters.hits,
            misses: counters.misses,
            writes: counters.writes,
            deletes: counters.deletes,
            hit_rate: counters.hit_rate(),
            file_count,
            max_files: self.config.max_files,
            total_size_bytes,
            cache_dir: self.config.cache_dir.display().to_string(),
        }
    }

    fn read_entry<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let (value_path, meta_path) = self.entry_paths(key);
        if !value_path.exists() || !meta_path.exists() {
            return Ok(None);
        }

        let mut metadata = read_metadata(&meta_path)?;
        if metadata.is_expired() {
            debug!("Cache expired for key: {}", key);
            remove_pair(&value_path, &meta_path)?;
            return Ok(None);
        }

        let bytes = fs::read(&value_path)
            .map_err(|e| CacheError::io_error(value_path.clone(), IoOperation::Read, e))?;
        let value = serde_json::from_slice(&bytes).map_err(|e| CacheError::Deserialization {
            message: format!("{}: {}", value_path.display(), e),
        })?;

        metadata.accessed_at = Utc::now();
        metadata.access_count += 1;
        write_metadata(&meta_path, &metadata)?;

        Ok(Some(value))
    }

    fn write_entry<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<u64> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
            message: e.to_string(),
        })?;

        let (value_path, meta_path) = self.entry_paths(key);
        let incoming = usize::from(!value_path.exists());
        self.evict_overflow(incoming)?;
        fs::write(&value_path, &bytes)
            .map_err(|e| CacheError::io_error(value_path.clone(), IoOperation::Write, e))?;

        let now = Utc::now();
        let ttl = ttl.filter(|t| !t.is_zero()).or(self.config.default_ttl);
        let metadata = FileEntryMetadata {
            key: key.to_string(),
            created_at: now,
            accessed_at: now,
            access_count: 0,
            ttl: ttl.map(|t| t.as_secs_f64()),
            size: bytes.len() as u64,
        };
        write_metadata(&meta_path, &metadata)?;

        Ok(metadata.size)
    }

    /// Drop the oldest value files so `incoming` new files fit under `max_files`
    fn evict_overflow(&self, incoming: usize) -> CacheResult<()> {
        let files = self.list_files(&[VALUE_EXTENSION])?;
        let max_files = self.config.max_files.max(1);
        if files.len() + incoming <= max_files {
            return Ok(());
        }

        let excess = files.len() + incoming - max_files;
        let mut by_age: Vec<(SystemTime, PathBuf)> = files
            .into_iter()
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, path)
            })
            .collect();
        by_age.sort();

        for (_, value_path) in by_age.into_iter().take(excess) {
            let meta_path = value_path.with_extension(META_EXTENSION);
            remove_pair(&value_path, &meta_path)?;
            debug!("Evicted oldest cache file: {}", value_path.display());
        }
        Ok(())
    }

    fn entry_paths(&self, key: &str) -> (PathBuf, PathBuf) {
        let hash = hash_key(key);
        (
            self.config
                .cache_dir
                .join(format!("{}.{}", hash, VALUE_EXTENSION)),
            self.config
                .cache_dir
                .join(format!("{}.{}", hash, META_EXTENSION)),
        )
    }

    fn list_files(&self, extensions: &[&str]) -> CacheResult<Vec<PathBuf>> {
        let dir = &self.config.cache_dir;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in
            fs::read_dir(dir).map_err(|e| CacheError::io_error(dir.clone(), IoOperation::List, e))?
        {
            let path = entry
                .map_err(|e| CacheError::io_error(dir.clone(), IoOperation::List, e))?
                .path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| extensions.contains(&ext));
            if matches && path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// MD5 hex digest used to name an entry's files
pub fn hash_key(key: &str) -> String {
    format!("{:x}", md5::compute(key.as_bytes()))
}

fn read_metadata(path: &Path) -> CacheResult<FileEntryMetadata> {
    let content = fs::read_to_string(path)
        .map_err(|e| CacheError::io_error(path.to_path_buf(), IoOperation::Read, e))?;
    serde_json::from_str(&content).map_err(|e| CacheError::Deserialization {
        message: format!("{}: {}", path.display(), e),
    })
}

fn write_metadata(path: &Path, metadata: &FileEntryMetadata) -> CacheResult<()> {
    let json = serde_json::to_string_pretty(metadata)?;
    fs::write(path, json).map_err(|e| CacheError::io_error(path.to_path_buf(), IoOperation::Write, e))
}

fn remove_pair(value_path: &Path, meta_path: &Path) -> CacheResult<bool> {
    let mut removed = false;
    for path in [value_path, meta_path] {
        if path.exists() {
            fs::remove_file(path)
                .map_err(|e| CacheError::io_error(path.to_path_buf(), IoOperation::Delete, e))?;
            removed = true;
        }
    }
    Ok(removed)
}
