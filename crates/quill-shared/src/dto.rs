//! Data Transfer Objects - request/response types for the API.
//!
//! Request types carry a `validate` method that returns every problem at
//! once, so clients can fix a form in one round trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_USERNAME_CHARS: usize = 3;
pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MIN_PAGE_LIMIT: u64 = 5;

fn check_username(name: &str, errors: &mut Vec<String>) {
    if name.chars().count() < MIN_USERNAME_CHARS {
        errors.push(format!(
            "username must be at least {MIN_USERNAME_CHARS} characters"
        ));
    }
}

fn check_password(password: &str, errors: &mut Vec<String>) {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.push(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        ));
    }
}

fn finish(errors: Vec<String>) -> Result<(), Vec<String>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// ---------------------------------------------------------------------------
// Users and auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        check_username(&self.username, &mut errors);
        check_password(&self.password, &mut errors);
        finish(errors)
    }
}

/// Empty or missing fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if let Some(name) = self.username.as_deref().filter(|s| !s.is_empty()) {
            check_username(name, &mut errors);
        }
        if let Some(password) = self.password.as_deref().filter(|s| !s.is_empty()) {
            check_password(password, &mut errors);
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        check_username(&self.username, &mut errors);
        check_password(&self.password, &mut errors);
        finish(errors)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// A user's public profile. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.title.trim().is_empty() {
            errors.push("title is required".to_string());
        }
        if self.body.trim().is_empty() {
            errors.push("body is required".to_string());
        }
        finish(errors)
    }
}

/// Empty or missing fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query string for post listings. `skip` counts pages from 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    MIN_PAGE_LIMIT
}

impl Default for ListPostsQuery {
    fn default() -> Self {
        Self {
            q: None,
            skip: 0,
            limit: MIN_PAGE_LIMIT,
        }
    }
}

impl ListPostsQuery {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        if self.limit < MIN_PAGE_LIMIT {
            return Err(vec![format!("limit must be at least {MIN_PAGE_LIMIT}")]);
        }
        Ok(())
    }

    /// The search term, if one was given and isn't blank.
    pub fn term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListResponse {
    pub meta: crate::ListMeta,
    pub posts: Vec<PostResponse>,
}
