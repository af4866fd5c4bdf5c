//! The unit of storage for the in-memory tier

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::error::{CacheError, CacheResult};

/// Stored form of a cached value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachedValue {
    /// Value with a JSON representation
    Json(serde_json::Value),
    /// bincode encoding of a value JSON cannot represent, such as a map
    /// with non-string keys
    Encoded(Vec<u8>),
}

impl CachedValue {
    /// Encode a value, preferring JSON and falling back to bincode
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> CacheResult<Self> {
        match serde_json::to_value(value) {
            Ok(json) => Ok(CachedValue::Json(json)),
            Err(json_err) => {
                debug!("Value has no JSON form ({}), storing it encoded", json_err);
                bincode::serialize(value)
                    .map(CachedValue::Encoded)
                    .map_err(|e| CacheError::Serialization {
                        message: format!("{}; {}", json_err, e),
                    })
            }
        }
    }

    /// Decode into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> CacheResult<T> {
        match self {
            CachedValue::Json(json) => Ok(T::deserialize(json)?),
            CachedValue::Encoded(bytes) => {
                bincode::deserialize(bytes).map_err(|e| CacheError::Deserialization {
                    message: e.to_string(),
                })
            }
        }
    }

    /// The JSON form, if the value has one
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            CachedValue::Json(json) => Some(json),
            CachedValue::Encoded(_) => None,
        }
    }
}

impl From<serde_json::Value> for CachedValue {
    fn from(json: serde_json::Value) -> Self {
        CachedValue::Json(json)
    }
}

/// A cached value together with its bookkeeping.
///
/// Expiry is measured from `created_at` only; reads update `accessed_at`
/// and `access_count` but never push expiry back.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// Key under which the entry is stored
    pub key: String,
    /// The cached data
    pub value: CachedValue,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
    /// When the entry was last read
    pub accessed_at: DateTime<Utc>,
    /// Number of successful reads
    pub access_count: u64,
    /// Time to live, `None` never expires
    pub ttl: Option<Duration>,
    /// Estimated size in bytes, charged against the memory budget
    pub size: usize,
    /// Caller-supplied metadata, never interpreted by the cache
    pub metadata: HashMap<String, serde_json::Value>,
    /// Insertion order within the owning cache, used to break eviction ties
    #[serde(skip)]
    pub(crate) sequence: u64,
}

impl CacheEntry {
    /// Create a new cache entry
    pub fn new(
        key: impl Into<String>,
        value: impl Into<CachedValue>,
        ttl: Option<Duration>,
        size: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            value: value.into(),
            created_at: now,
            accessed_at: now,
            access_count: 0,
            ttl,
            size,
            metadata: HashMap::new(),
            sequence: 0,
        }
    }

    /// Attach caller metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.age() > ttl,
            None => false,
        }
    }

    /// Record a successful read
    pub fn touch(&mut self) {
        self.accessed_at = Utc::now();
        self.access_count += 1;
    }

    /// Time elapsed since creation
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Remaining time before expiry, `None` if the entry has no TTL
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.ttl.map(|ttl| ttl.saturating_sub(self.age()))
    }
}
