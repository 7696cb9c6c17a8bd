//! ContentService - cache-aside orchestration over the store.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::{CacheKey, EntityCache, Lookup};
use crate::error::DomainError;
use crate::ports::{CacheError, PasswordService, PostRepository, TokenService, UserRepository};

use super::RequestContext;

fn cached<T>(key: &CacheKey, lookup: Lookup<T>) -> Option<T> {
    match lookup {
        Lookup::Hit(value) => {
            tracing::debug!(key = %key, "Cache hit");
            Some(value)
        }
        Lookup::Miss => {
            tracing::debug!(key = %key, "Cache miss");
            None
        }
        Lookup::Fault(e) => {
            tracing::warn!(key = %key, error = %e, "Cache read failed, falling back to store");
            None
        }
    }
}

fn populated(key: &CacheKey, result: Result<(), CacheError>) {
    if let Err(e) = result {
        tracing::warn!(key = %key, error = %e, "Failed to populate cache");
    }
}

/// A failed write whose effect on the store is unknown: it may have committed
/// before the context fired, or the store no longer had the row the cached
/// copy described.
pub(super) fn unconfirmed(err: &DomainError) -> bool {
    matches!(err, DomainError::Cancelled | DomainError::NotFound { .. })
}

/// Entry point for every post and user operation.
///
/// Reads go cache first, store on miss; writes go to the store first and
/// then refresh or evict the affected cache entries. Cache trouble is
/// logged and never fails an operation.
pub struct ContentService {
    pub(super) users: Arc<dyn UserRepository>,
    pub(super) posts: Arc<dyn PostRepository>,
    pub(super) cache: EntityCache,
    pub(super) hasher: Arc<dyn PasswordService>,
    pub(super) tokens: Arc<dyn TokenService>,
    dummy_hash: OnceLock<Option<String>>,
}

impl ContentService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        cache: EntityCache,
        hasher: Arc<dyn PasswordService>,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            users,
            posts,
            cache,
            hasher,
            tokens,
            dummy_hash: OnceLock::new(),
        }
    }

    /// Cache-aside read: hit returns immediately, miss or fault loads from
    /// the store and repopulates the entry.
    pub(super) async fn read_through<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        key: &CacheKey,
        ttl: Duration,
        load: F,
    ) -> Result<T, DomainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        if let Some(value) = cached(key, ctx.run(self.cache.get_entity::<T>(key)).await?) {
            return Ok(value);
        }

        let value = ctx.run(load()).await??;
        populated(key, ctx.run(self.cache.set_entity(key, &value, ttl)).await?);
        Ok(value)
    }

    /// [`Self::read_through`] for one page of a listing.
    pub(super) async fn read_list_through<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        key: &CacheKey,
        ttl: Duration,
        load: F,
    ) -> Result<Vec<T>, DomainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, DomainError>>,
    {
        if let Some(values) = cached(key, ctx.run(self.cache.get_list::<T>(key)).await?) {
            return Ok(values);
        }

        let values = ctx.run(load()).await??;
        populated(key, ctx.run(self.cache.set_list(key, &values, ttl)).await?);
        Ok(values)
    }

    /// Overwrite an entry with a fresh store snapshot after a committed write.
    ///
    /// If the overwrite fails the entry is deleted instead so the old value
    /// cannot outlive the write.
    pub(super) async fn refresh<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) {
        if let Err(e) = self.cache.set_entity(key, value, ttl).await {
            tracing::warn!(key = %key, error = %e, "Failed to refresh cache entry");
            self.evict(key).await;
        }
    }

    pub(super) async fn evict(&self, key: &CacheKey) {
        if let Err(e) = self.cache.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to evict cache entry");
        }
    }

    pub(super) async fn evict_prefix(&self, prefix: &str) {
        match self.cache.delete_by_prefix(prefix).await {
            Ok(removed) => tracing::debug!(prefix, removed, "Evicted cache entries by prefix"),
            Err(e) => tracing::warn!(prefix, error = %e, "Failed to evict cache entries by prefix"),
        }
    }

    /// Hash compared against when a login names an unknown user.
    pub(super) fn dummy_hash(&self) -> Option<&str> {
        self.dummy_hash
            .get_or_init(|| match self.hasher.hash("quill-login-timing-guard") {
                Ok(hash) => Some(hash),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not prepare login timing guard");
                    None
                }
            })
            .as_deref()
    }
}
