//! Cache-aside building blocks: key scheme and typed entity cache.

mod entity;
pub mod keys;

pub use entity::{CacheTtl, EntityCache, Lookup};
pub use keys::{CacheKey, Namespace};
