//! Cache storage backends

pub mod file;
pub mod memory;

pub use file::{hash_key, FileCache, FileCacheConfig, FileEntryMetadata};
pub use memory::{MemoryCache, MemoryCacheConfig};
