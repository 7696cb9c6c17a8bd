//! Typed view over the raw [`Cache`] port.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ports::{Cache, CacheError};

use super::keys::CacheKey;

/// Time-to-live per cached shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub user: Duration,
    pub post: Duration,
    pub list: Duration,
    pub search: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            user: Duration::from_secs(3600),
            post: Duration::from_secs(3600),
            list: Duration::from_secs(120),
            search: Duration::from_secs(120),
        }
    }
}

/// Outcome of a cache read.
#[derive(Debug)]
pub enum Lookup<T> {
    Hit(T),
    /// Key absent or expired.
    Miss,
    /// Backend or decoding failure. Callers treat it as a miss.
    Fault(CacheError),
}

/// Serializes domain values to JSON bytes under [`CacheKey`]s.
#[derive(Clone)]
pub struct EntityCache {
    cache: Arc<dyn Cache>,
    ttl: CacheTtl,
}

impl EntityCache {
    pub fn new(cache: Arc<dyn Cache>, ttl: CacheTtl) -> Self {
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    pub async fn get_entity<T: DeserializeOwned>(&self, key: &CacheKey) -> Lookup<T> {
        match self.cache.get(key.as_str()).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Lookup::Hit(value),
                Err(e) => Lookup::Fault(CacheError::Serialization(e.to_string())),
            },
            Ok(None) => Lookup::Miss,
            Err(e) => Lookup::Fault(e),
        }
    }

    pub async fn set_entity<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.cache.set(key.as_str(), &bytes, Some(ttl)).await
    }

    pub async fn get_list<T: DeserializeOwned>(&self, key: &CacheKey) -> Lookup<Vec<T>> {
        self.get_entity(key).await
    }

    pub async fn set_list<T: Serialize>(
        &self,
        key: &CacheKey,
        values: &[T],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.set_entity(key, values, ttl).await
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.cache.delete(key.as_str()).await
    }

    pub async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        self.cache.delete_by_prefix(prefix).await
    }
}
