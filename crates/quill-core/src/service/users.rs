//! User and identity operations.

use uuid::Uuid;

use crate::cache::keys;
use crate::domain::{TokenPayload, User, UserChanges, UserPatch};
use crate::error::{DomainError, RepoError};
use crate::ports::AuthError;

use super::content::unconfirmed;
use super::{AuthorizationGuard, ContentService, RequestContext};

fn hashing_failed(e: AuthError) -> DomainError {
    tracing::error!(error = %e, "Password hashing failed");
    DomainError::Internal(e.to_string())
}

impl ContentService {
    /// Register a user. The returned record carries no password hash.
    #[tracing::instrument(skip(self, ctx, password))]
    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        name: String,
        password: String,
    ) -> Result<User, DomainError> {
        let password_hash = self.hasher.hash(&password).map_err(hashing_failed)?;
        let user = User::new(name, password_hash);
        let id = user.id;

        let created = ctx
            .run(self.users.create(user))
            .await?
            .map_err(|e| DomainError::from_repo(e, "user", id))?
            .redacted();

        tracing::info!(user_id = %created.id, "User created");
        self.refresh(&keys::user_key(created.id), &created, self.cache.ttl().user)
            .await;

        Ok(created)
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_user(&self, ctx: &RequestContext, id: Uuid) -> Result<User, DomainError> {
        let key = keys::user_key(id);
        let ttl = self.cache.ttl().user;

        self.read_through(ctx, &key, ttl, || async move {
            self.users
                .find_by_id(id)
                .await
                .map_err(|e| DomainError::from_repo(e, "user", id))?
                .map(User::redacted)
                .ok_or_else(|| DomainError::not_found("user", id))
        })
        .await
    }

    /// Resolve a user through the read path and check the caller is that user.
    pub async fn authorize_user(
        &self,
        ctx: &RequestContext,
        caller_id: Uuid,
        user_id: Uuid,
    ) -> Result<User, DomainError> {
        let user = self.get_user(ctx, user_id).await?;
        AuthorizationGuard::check(caller_id, &user)?;
        Ok(user)
    }

    /// Rename a user and/or change their password.
    ///
    /// Fails with `NoChange`, before touching the store, when nothing would differ.
    #[tracing::instrument(skip(self, ctx, caller, changes), fields(caller_id = %caller.subject_id))]
    pub async fn update_user(
        &self,
        ctx: &RequestContext,
        caller: &TokenPayload,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<User, DomainError> {
        let current = self.authorize_user(ctx, caller.subject_id, id).await?;

        let changes = changes.against(&current);
        if changes.is_empty() {
            return Err(DomainError::NoChange);
        }

        let password_hash = changes
            .password
            .as_deref()
            .map(|p| self.hasher.hash(p))
            .transpose()
            .map_err(hashing_failed)?;
        let patch = UserPatch {
            name: changes.name,
            password_hash,
        };

        let outcome = ctx
            .run(self.users.update(id, patch))
            .await
            .and_then(|r| r.map_err(|e| DomainError::from_repo(e, "user", id)));
        let updated = match outcome {
            Ok(user) => user.redacted(),
            Err(err) => {
                if unconfirmed(&err) {
                    tracing::warn!(user_id = %id, error = %err, "User update unconfirmed, evicting cached copy");
                    self.evict(&keys::user_key(id)).await;
                }
                return Err(err);
            }
        };

        tracing::info!(user_id = %id, "User updated");
        self.refresh(&keys::user_key(id), &updated, self.cache.ttl().user)
            .await;

        Ok(updated)
    }

    /// Delete a user. The store removes their posts in the same transaction;
    /// every cached copy of those posts is evicted afterwards.
    #[tracing::instrument(skip(self, ctx, caller), fields(caller_id = %caller.subject_id))]
    pub async fn delete_user(
        &self,
        ctx: &RequestContext,
        caller: &TokenPayload,
        id: Uuid,
    ) -> Result<(), DomainError> {
        self.authorize_user(ctx, caller.subject_id, id).await?;

        let outcome = ctx
            .run(self.users.delete(id))
            .await
            .and_then(|r| r.map_err(|e| DomainError::from_repo(e, "user", id)));
        let cascaded = match outcome {
            Ok(cascaded) => cascaded,
            Err(err) => {
                if unconfirmed(&err) {
                    // The cascaded post ids are unknown, so every cached post goes.
                    tracing::warn!(user_id = %id, error = %err, "User delete unconfirmed, evicting cached user and posts");
                    self.evict(&keys::user_key(id)).await;
                    self.evict_prefix(&keys::post_prefix()).await;
                    self.invalidate_post_listings(id).await;
                }
                return Err(err);
            }
        };

        tracing::info!(user_id = %id, posts = cascaded.len(), "User deleted");
        self.evict(&keys::user_key(id)).await;
        for post_id in &cascaded {
            self.evict(&keys::post_key(*post_id)).await;
        }
        if !cascaded.is_empty() {
            self.invalidate_post_listings(id).await;
        }

        Ok(())
    }

    /// Exchange a name and password for a signed session token.
    ///
    /// Unknown names and wrong passwords both yield `InvalidCredentials`,
    /// and both cost one hash verification.
    #[tracing::instrument(skip(self, ctx, password))]
    pub async fn login(
        &self,
        ctx: &RequestContext,
        name: &str,
        password: &str,
    ) -> Result<String, DomainError> {
        let user = match ctx.run(self.users.find_by_name(name)).await? {
            Ok(user) => user,
            Err(RepoError::NotFound) => None,
            Err(e) => return Err(DomainError::from_repo(e, "user", name)),
        };

        let verified = match &user {
            Some(user) => self
                .hasher
                .verify(password, &user.password_hash)
                .map_err(hashing_failed)?,
            None => {
                if let Some(hash) = self.dummy_hash() {
                    let _ = self.hasher.verify(password, hash);
                }
                false
            }
        };

        let user = match user {
            Some(user) if verified => user,
            _ => {
                tracing::debug!("Login rejected");
                return Err(DomainError::InvalidCredentials);
            }
        };

        self.tokens
            .create_token(&TokenPayload::from(&user))
            .map_err(|e| {
                tracing::error!(error = %e, "Token creation failed");
                DomainError::Internal(e.to_string())
            })
    }

    /// Verify a bearer token. Any failure is `Unauthorized`.
    pub fn authenticate(&self, token: &str) -> Result<TokenPayload, DomainError> {
        self.tokens.verify_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            DomainError::Unauthorized
        })
    }

    /// Lifetime of tokens issued by [`ContentService::login`].
    pub fn token_lifetime_seconds(&self) -> i64 {
        self.tokens.expiration_seconds()
    }
}
