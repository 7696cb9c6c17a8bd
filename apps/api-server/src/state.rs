//! Application state - shared across all handlers.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use quill_core::cache::EntityCache;
use quill_core::ports::{Cache, PostRepository, UserRepository};
use quill_core::{ContentService, RequestContext};
use quill_infra::{Argon2PasswordService, InMemoryCache, InMemoryStore, JwtTokenService};

#[cfg(feature = "postgres")]
use quill_infra::{PostgresPostRepository, PostgresUserRepository};
#[cfg(feature = "redis")]
use quill_infra::RedisCache;

use crate::config::AppConfig;

/// Names of the adapters actually in use, reported by the health check.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Backends {
    pub store: &'static str,
    pub cache: &'static str,
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            store: "memory",
            cache: "memory",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub content: Arc<ContentService>,
    pub request_timeout: Duration,
    pub backends: Backends,
}

type Repositories = (Arc<dyn UserRepository>, Arc<dyn PostRepository>);

fn in_memory_store() -> (Repositories, &'static str) {
    let store = InMemoryStore::new();
    ((Arc::new(store.users()), Arc::new(store.posts())), "memory")
}

impl AppState {
    /// Wire adapters from configuration. Missing or unreachable backends
    /// fall back to their in-memory versions unless configured otherwise.
    pub async fn new(config: &AppConfig) -> std::io::Result<Self> {
        let (cache, cache_name) = Self::build_cache(config).await?;
        let ((users, posts), store_name) = Self::build_store(config).await;

        let content = ContentService::new(
            users,
            posts,
            EntityCache::new(cache, config.cache_ttl),
            Arc::new(Argon2PasswordService::new()),
            Arc::new(JwtTokenService::new(config.jwt.clone())),
        );

        let backends = Backends {
            store: store_name,
            cache: cache_name,
        };
        tracing::info!(store = backends.store, cache = backends.cache, "Application state initialized");

        Ok(Self {
            content: Arc::new(content),
            request_timeout: config.request_timeout,
            backends,
        })
    }

    pub fn from_parts(content: Arc<ContentService>, request_timeout: Duration) -> Self {
        Self {
            content,
            request_timeout,
            backends: Backends::default(),
        }
    }

    /// A fresh context for one request.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }

    #[cfg(feature = "redis")]
    async fn build_cache(config: &AppConfig) -> std::io::Result<(Arc<dyn Cache>, &'static str)> {
        let Some(redis) = &config.redis else {
            tracing::warn!("REDIS_URL not set. Using in-memory cache.");
            return Ok((Arc::new(InMemoryCache::new()), "memory"));
        };

        match RedisCache::new(redis).await {
            Ok(cache) => Ok((Arc::new(cache), "redis")),
            Err(e) if redis.fallback_to_memory => {
                tracing::error!(error = %e, "Failed to connect to Redis. Using in-memory cache.");
                Ok((Arc::new(InMemoryCache::new()), "memory"))
            }
            Err(e) => Err(std::io::Error::other(e.to_string())),
        }
    }

    #[cfg(not(feature = "redis"))]
    async fn build_cache(_config: &AppConfig) -> std::io::Result<(Arc<dyn Cache>, &'static str)> {
        tracing::info!("Running without redis feature - using in-memory cache");
        Ok((Arc::new(InMemoryCache::new()), "memory"))
    }

    #[cfg(feature = "postgres")]
    async fn build_store(config: &AppConfig) -> (Repositories, &'static str) {
        let Some(db) = &config.database else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
            return in_memory_store();
        };

        match db.connect().await {
            Ok(conn) => (
                (
                    Arc::new(PostgresUserRepository::new(conn.clone())),
                    Arc::new(PostgresPostRepository::new(conn)),
                ),
                "postgres",
            ),
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to database. Using in-memory fallback.");
                in_memory_store()
            }
        }
    }

    #[cfg(not(feature = "postgres"))]
    async fn build_store(_config: &AppConfig) -> (Repositories, &'static str) {
        tracing::info!("Running without postgres feature - using in-memory store");
        in_memory_store()
    }
}
