use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User entity - an author account.
///
/// `password_hash` is only populated on records read straight from the
/// store. Anything cached or returned to callers goes through
/// [`User::redacted`] first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with generated ID and timestamps.
    pub fn new(name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// Drop the password hash.
    pub fn redacted(mut self) -> Self {
        self.password_hash.clear();
        self
    }
}

/// Requested changes to a user. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub password: Option<String>,
}

impl UserChanges {
    /// Keep only the fields that would actually change `current`.
    ///
    /// Empty strings count as "not provided".
    pub fn against(self, current: &User) -> Self {
        Self {
            name: self
                .name
                .filter(|n| !n.is_empty() && *n != current.name),
            password: self.password.filter(|p| !p.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.password.is_none()
    }
}

/// Field merge handed to the store once the password has been hashed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub password_hash: Option<String>,
}
