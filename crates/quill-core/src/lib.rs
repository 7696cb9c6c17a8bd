//! # Quill Core
//!
//! The domain layer of the Quill blog service.
//! Pure business logic: entities, ports, the cache-aside layer and the
//! ownership rules. Infrastructure lives in `quill-infra`.

pub mod cache;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use error::DomainError;
pub use service::{ContentService, RequestContext};
