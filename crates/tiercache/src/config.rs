//! Cache settings
//!
//! Settings come from defaults, a caller-supplied mapping, or an optional
//! config file layered under `TIERCACHE_*` environment variables.

use std::{path::PathBuf, time::Duration};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CacheError, CacheResult},
    storage::{FileCacheConfig, MemoryCacheConfig},
    strategy::EvictionStrategy,
};

/// Environment variable prefix for settings overrides
pub const ENV_PREFIX: &str = "TIERCACHE";

/// Settings for a [`CacheManager`](crate::CacheManager) and its sub-caches
///
/// TTLs are whole seconds. Unspecified options keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub memory_max_size: usize,
    pub memory_max_memory: usize,
    pub memory_default_ttl: u64,
    pub file_cache_dir: PathBuf,
    pub file_max_files: usize,
    pub file_default_ttl: u64,
    pub analysis_max_size: usize,
    pub analysis_ttl: u64,
    pub session_max_size: usize,
    pub session_ttl: u64,
    /// Eviction strategy for the memory, analysis, and session caches
    pub memory_strategy: EvictionStrategy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_max_size: 1000,
            memory_max_memory: 104_857_600, // 100MB
            memory_default_ttl: 3600,
            file_cache_dir: PathBuf::from("./cache"),
            file_max_files: 1000,
            file_default_ttl: 86400,
            analysis_max_size: 500,
            analysis_ttl: 1800,
            session_max_size: 100,
            session_ttl: 7200,
            memory_strategy: EvictionStrategy::Lru,
        }
    }
}

impl CacheSettings {
    /// Build settings from a mapping of option names to values
    pub fn from_value(value: serde_json::Value) -> CacheResult<Self> {
        let settings: CacheSettings = serde_json::from_value(value)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from an optional file plus `TIERCACHE_*` environment variables
    ///
    /// The file format is inferred from its extension (TOML, JSON, YAML).
    /// Environment variables take precedence, e.g. `TIERCACHE_MEMORY_MAX_SIZE=50`.
    pub fn load(path: Option<PathBuf>) -> CacheResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let settings: CacheSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that cannot produce a working cache
    pub fn validate(&self) -> CacheResult<()> {
        let positive = [
            ("memory_max_size", self.memory_max_size),
            ("memory_max_memory", self.memory_max_memory),
            ("file_max_files", self.file_max_files),
            ("analysis_max_size", self.analysis_max_size),
            ("session_max_size", self.session_max_size),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(CacheError::validation(field, "must be greater than 0"));
            }
        }

        if self.file_cache_dir.as_os_str().is_empty() {
            return Err(CacheError::validation("file_cache_dir", "must not be empty"));
        }
        Ok(())
    }

    /// Config for the general memory cache
    pub fn memory_config(&self) -> MemoryCacheConfig {
        MemoryCacheConfig {
            max_size: self.memory_max_size,
            max_memory: self.memory_max_memory,
            default_ttl: ttl_from_secs(self.memory_default_ttl),
            strategy: self.memory_strategy,
        }
    }

    /// Config for the file cache
    pub fn file_config(&self) -> FileCacheConfig {
        FileCacheConfig {
            cache_dir: self.file_cache_dir.clone(),
            max_files: self.file_max_files,
            default_ttl: ttl_from_secs(self.file_default_ttl),
        }
    }

    /// Config for the analysis-result cache; shares the general byte budget
    pub fn analysis_config(&self) -> MemoryCacheConfig {
        MemoryCacheConfig {
            max_size: self.analysis_max_size,
            default_ttl: ttl_from_secs(self.analysis_ttl),
            ..self.memory_config()
        }
    }

    /// Config for the session-state cache; shares the general byte budget
    pub fn session_config(&self) -> MemoryCacheConfig {
        MemoryCacheConfig {
            max_size: self.session_max_size,
            default_ttl: ttl_from_secs(self.session_ttl),
            ..self.memory_config()
        }
    }
}

// A zero TTL means "no expiry".
fn ttl_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults_match_documented_table() {
        let settings = CacheSettings::default();
        assert_eq!(settings.memory_max_size, 1000);
        assert_eq!(settings.memory_max_memory, 100 * 1024 * 1024);
        assert_eq!(settings.memory_default_ttl, 3600);
        assert_eq!(settings.file_cache_dir, PathBuf::from("./cache"));
        assert_eq!(settings.file_max_files, 1000);
        assert_eq!(settings.file_default_ttl, 86400);
        assert_eq!(settings.analysis_max_size, 500);
        assert_eq!(settings.analysis_ttl, 1800);
        assert_eq!(settings.session_max_size, 100);
        assert_eq!(settings.session_ttl, 7200);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_mapping_keeps_defaults() {
        let settings = CacheSettings::from_value(json!({
            "memory_max_size": 10,
            "file_cache_dir": "/tmp/elsewhere",
            "memory_strategy": "lfu",
        }))
        .unwrap();

        assert_eq!(settings.memory_max_size, 10);
        assert_eq!(settings.file_cache_dir, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(settings.memory_strategy, EvictionStrategy::Lfu);
        assert_eq!(settings.session_ttl, 7200);
    }

    #[test]
    fn test_zero_caps_are_rejected() {
        let err = CacheSettings::from_value(json!({"session_max_size": 0})).unwrap_err();
        assert!(matches!(err, CacheError::Validation { ref field, .. } if field == "session_max_size"));
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        assert!(CacheSettings::from_value(json!({"memory_max_size": "lots"})).is_err());
    }

    #[test]
    fn test_sub_cache_configs() {
        let settings = CacheSettings::default();

        let analysis = settings.analysis_config();
        assert_eq!(analysis.max_size, 500);
        assert_eq!(analysis.default_ttl, Some(Duration::from_secs(1800)));
        assert_eq!(analysis.max_memory, settings.memory_max_memory);

        let session = settings.session_config();
        assert_eq!(session.max_size, 100);
        assert_eq!(session.default_ttl, Some(Duration::from_secs(7200)));

        let file = settings.file_config();
        assert_eq!(file.max_files, 1000);
        assert_eq!(file.default_ttl, Some(Duration::from_secs(86400)));
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let settings = CacheSettings {
            memory_default_ttl: 0,
            ..CacheSettings::default()
        };
        assert_eq!(settings.memory_config().default_ttl, None);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "memory_max_size = 42").unwrap();
        writeln!(file, "analysis_ttl = 60").unwrap();
        writeln!(file, "memory_strategy = \"ttl\"").unwrap();

        let settings = CacheSettings::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(settings.memory_max_size, 42);
        assert_eq!(settings.analysis_ttl, 60);
        assert_eq!(settings.memory_strategy, EvictionStrategy::Ttl);
        assert_eq!(settings.file_max_files, 1000);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let missing = PathBuf::from("/nonexistent/tiercache/settings.toml");
        let settings = CacheSettings::load(Some(missing)).unwrap();
        assert_eq!(settings.session_max_size, 100);
    }
}
