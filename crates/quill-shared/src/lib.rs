//! # Quill Shared
//!
//! Request and response types for the HTTP API.
//! Free of server dependencies so clients can use them as-is.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse, ListMeta};
