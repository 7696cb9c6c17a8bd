//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use quill_core::cache::CacheTtl;
use quill_infra::JwtConfig;

#[cfg(feature = "postgres")]
use quill_infra::DatabaseConfig;
#[cfg(feature = "redis")]
use quill_infra::RedisConfig;

fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs on the in-memory store.
    #[cfg(feature = "postgres")]
    pub database: Option<DatabaseConfig>,
    /// `None` runs on the in-memory cache.
    #[cfg(feature = "redis")]
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    pub cache_ttl: CacheTtl,
    /// Deadline for each request's store and cache work.
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = CacheTtl::default();
        let ttl = |name: &str, default: Duration| {
            Duration::from_secs(parse_or(name, default.as_secs()))
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("PORT", 8080),
            #[cfg(feature = "postgres")]
            database: DatabaseConfig::from_env(),
            #[cfg(feature = "redis")]
            redis: env::var("REDIS_URL").ok().map(|_| RedisConfig::from_env()),
            jwt: JwtConfig::from_env(),
            cache_ttl: CacheTtl {
                user: ttl("CACHE_USER_TTL_SECS", defaults.user),
                post: ttl("CACHE_POST_TTL_SECS", defaults.post),
                list: ttl("CACHE_LIST_TTL_SECS", defaults.list),
                search: ttl("CACHE_SEARCH_TTL_SECS", defaults.search),
            },
            request_timeout: Duration::from_millis(parse_or("REQUEST_TIMEOUT_MS", 5000)),
        }
    }
}
