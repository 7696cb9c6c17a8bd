//! Application services.

mod content;
mod context;
mod guard;
mod posts;
mod users;

pub use content::ContentService;
pub use context::RequestContext;
pub use guard::{AuthorizationGuard, Owned};

#[cfg(test)]
mod tests;
