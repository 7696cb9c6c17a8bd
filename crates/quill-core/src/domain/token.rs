use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::User;

/// Identity claims carried by a verified session token.
///
/// This is the only authorization input the core trusts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub subject_id: Uuid,
    pub subject_name: String,
}

impl From<&User> for TokenPayload {
    fn from(user: &User) -> Self {
        Self {
            subject_id: user.id,
            subject_name: user.name.clone(),
        }
    }
}
