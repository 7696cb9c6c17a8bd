//! Authentication ports: session tokens and password hashing.

use crate::domain::TokenPayload;

/// Issues and verifies signed session tokens.
pub trait TokenService: Send + Sync {
    /// Sign a token carrying the given identity.
    fn create_token(&self, identity: &TokenPayload) -> Result<String, AuthError>;

    /// Verify a token and return the identity it carries.
    fn verify_token(&self, token: &str) -> Result<TokenPayload, AuthError>;

    /// Lifetime of newly issued tokens.
    fn expiration_seconds(&self) -> i64;
}

/// Password hashing service.
pub trait PasswordService: Send + Sync {
    /// Hash a plain text password.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Verify a password against a hash. Comparison must be constant-time.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Hashing error: {0}")]
    HashingError(String),
}
