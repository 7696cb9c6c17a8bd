//! Redis cache implementation backed by a reconnecting connection manager.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use quill_core::ports::{Cache, CacheError};

/// Keys fetched per SCAN round trip when deleting by prefix.
const SCAN_BATCH: usize = 100;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    pub connect_timeout: Duration,
    /// Whether the server should run on the in-memory cache if Redis is unavailable
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: true,
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            fallback_to_memory: std::env::var("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

fn op_error(e: RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
        CacheError::Connection(e.to_string())
    } else {
        CacheError::Operation(e.to_string())
    }
}

/// Redis-backed cache.
///
/// `ConnectionManager` is cheap to clone and reconnects on its own.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

        // Bound the initial connect so an unreachable Redis doesn't hang startup
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Connection("Connection timed out".to_string()))?
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        tracing::info!(url = %config.url, "Connected to Redis cache");

        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<Vec<u8>>>(key).await.map_err(op_error)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => conn
                .pset_ex::<_, _, ()>(key, value, ttl_millis(duration))
                .await
                .map_err(op_error),
            None => conn.set::<_, _, ()>(key, value).await.map_err(op_error),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(op_error)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(key).await.map_err(op_error)
    }

    /// SCAN for `prefix*` in batches and DEL each batch. Not atomic; keys
    /// written concurrently under the prefix may survive.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        drain_prefix(&mut conn, prefix).await
    }
}

/// PSETEX takes whole milliseconds and rejects 0.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// The two commands a prefix delete needs.
#[async_trait]
trait KeyScanner {
    /// One `SCAN cursor MATCH pattern COUNT n` round trip.
    async fn scan(&mut self, cursor: u64, pattern: &str) -> Result<(u64, Vec<String>), CacheError>;

    async fn delete_keys(&mut self, keys: &[String]) -> Result<u64, CacheError>;
}

#[async_trait]
impl KeyScanner for ConnectionManager {
    async fn scan(&mut self, cursor: u64, pattern: &str) -> Result<(u64, Vec<String>), CacheError> {
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query_async(self)
            .await
            .map_err(op_error)
    }

    async fn delete_keys(&mut self, keys: &[String]) -> Result<u64, CacheError> {
        self.del::<_, u64>(keys).await.map_err(op_error)
    }
}

/// Walk the cursor until it returns to 0, deleting every batch on the way.
///
/// A failing round trip stops the walk; batches already deleted stay deleted.
async fn drain_prefix<S: KeyScanner + Send>(scanner: &mut S, prefix: &str) -> Result<u64, CacheError> {
    let pattern = format!("{prefix}*");
    let mut cursor: u64 = 0;
    let mut removed: u64 = 0;

    loop {
        let (next, keys) = scanner.scan(cursor, &pattern).await?;

        if !keys.is_empty() {
            removed += scanner.delete_keys(&keys).await?;
        }

        if next == 0 {
            break;
        }
        cursor = next;
    }

    tracing::trace!(prefix, removed, "Deleted Redis keys by prefix");
    Ok(removed)
}
