//! # Tiercache
//!
//! Multi-tier caching: bounded in-memory caches with pluggable eviction, a
//! disk-backed cache with JSON metadata sidecars, and a namespaced manager
//! that owns both.
//!
//! ## Features
//!
//! - **Bounded memory**: entry-count and estimated byte budgets
//! - **Eviction strategies**: LRU, LFU, and TTL-first
//! - **Per-entry expiry**: TTL measured from creation, never extended by reads
//! - **Persistent disk tier**: one value file and one metadata file per key
//! - **Namespacing**: `analysis:`, `session:`, `user:`, `config:` key prefixes
//! - **Process-wide manager**: lazily built, explicitly replaceable
//!
//! Every operation is synchronous and serialized per cache instance.
//! Failures inside `get`/`set`/`delete`/`clear` are logged through `tracing`
//! and reported as a miss or `false`, never as an error.

pub mod config;
pub mod entry;
pub mod error;
pub mod global;
pub mod manager;
pub mod metrics;
pub mod sizing;
pub mod storage;
pub mod strategy;

pub use config::CacheSettings;
pub use entry::{CacheEntry, CachedValue};
pub use error::{CacheError, CacheResult};
pub use global::{get_cache_manager, init_cache, reset_cache_manager};
pub use manager::{CacheManager, CacheType};
pub use metrics::{CacheCounters, CacheManagerStats, FileCacheStats, MemoryCacheStats};
pub use storage::{FileCache, FileCacheConfig, FileEntryMetadata, MemoryCache, MemoryCacheConfig};
pub use strategy::EvictionStrategy;

/// Re-export commonly used types
pub type Result<T> = std::result::Result<T, CacheError>;
