//! Ownership checks for mutations.

use uuid::Uuid;

use crate::domain::{Post, User};
use crate::error::DomainError;

/// A resource with a single owning user.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

impl Owned for Post {
    fn owner_id(&self) -> Uuid {
        self.author_id
    }
}

impl Owned for User {
    fn owner_id(&self) -> Uuid {
        self.id
    }
}

/// Decides whether a caller may mutate a resource it has already resolved.
///
/// Resolution (and therefore not-found) is the caller's job; the guard only
/// compares owners, so it is pure and idempotent.
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    pub fn check<R: Owned>(caller_id: Uuid, resource: &R) -> Result<(), DomainError> {
        if resource.owner_id() == caller_id {
            Ok(())
        } else {
            tracing::debug!(caller_id = %caller_id, owner_id = %resource.owner_id(), "Ownership mismatch");
            Err(DomainError::Forbidden)
        }
    }
}
