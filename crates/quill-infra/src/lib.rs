//! # Quill Infrastructure
//!
//! Concrete implementations of the ports defined in `quill-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - In-memory cache and store only
//! - `postgres` - PostgreSQL store via SeaORM
//! - `auth` - JWT tokens + Argon2 password hashing
//! - `redis` - Redis cache

pub mod cache;
pub mod database;

#[cfg(feature = "auth")]
pub mod auth;

pub use cache::InMemoryCache;
pub use database::InMemoryStore;

#[cfg(feature = "auth")]
pub use auth::{Argon2PasswordService, JwtConfig, JwtTokenService};

#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, PostgresPostRepository, PostgresUserRepository};

#[cfg(feature = "redis")]
pub use cache::{RedisCache, RedisConfig};
