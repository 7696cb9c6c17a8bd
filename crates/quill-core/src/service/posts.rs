//! Post operations.

use uuid::Uuid;

use crate::cache::keys;
use crate::domain::{Post, PostChanges, PostQuery, TokenPayload};
use crate::error::DomainError;

use super::content::unconfirmed;
use super::{AuthorizationGuard, ContentService, RequestContext};

impl ContentService {
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_post(&self, ctx: &RequestContext, id: Uuid) -> Result<Post, DomainError> {
        let key = keys::post_key(id);
        let ttl = self.cache.ttl().post;

        self.read_through(ctx, &key, ttl, || async move {
            self.posts
                .find_by_id(id)
                .await
                .map_err(|e| DomainError::from_repo(e, "post", id))?
                .ok_or_else(|| DomainError::not_found("post", id))
        })
        .await
    }

    /// One page of posts. An empty page is `NotFound` and is not cached.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn list_posts(
        &self,
        ctx: &RequestContext,
        query: &PostQuery,
    ) -> Result<Vec<Post>, DomainError> {
        let key = keys::post_query_key(query);
        let ttl = match query {
            PostQuery::Search { .. } => self.cache.ttl().search,
            PostQuery::All(_) | PostQuery::ByAuthor { .. } => self.cache.ttl().list,
        };

        let listing = key.to_string();

        self.read_list_through(ctx, &key, ttl, || async move {
            let posts = match query {
                PostQuery::All(page) => self.posts.list(*page).await,
                PostQuery::Search { term, page } => self.posts.search_by_title(term, *page).await,
                PostQuery::ByAuthor { author_id, page } => {
                    self.posts.list_by_author(*author_id, *page).await
                }
            }
            .map_err(|e| DomainError::from_repo(e, "posts", &listing))?;

            if posts.is_empty() {
                return Err(DomainError::not_found("posts", &listing));
            }
            Ok(posts)
        })
        .await
    }

    /// Write a new post owned by `author`.
    #[tracing::instrument(skip(self, ctx, author, body), fields(author_id = %author.subject_id))]
    pub async fn create_post(
        &self,
        ctx: &RequestContext,
        author: &TokenPayload,
        title: String,
        body: String,
    ) -> Result<Post, DomainError> {
        let post = Post::new(author.subject_id, title, body);
        let id = post.id;

        let created = ctx
            .run(self.posts.create(post))
            .await?
            .map_err(|e| DomainError::from_repo(e, "post", id))?;

        tracing::info!(post_id = %created.id, "Post created");
        self.refresh(&keys::post_key(created.id), &created, self.cache.ttl().post)
            .await;

        Ok(created)
    }

    /// Resolve a post through the read path and check the caller wrote it.
    pub async fn authorize_post(
        &self,
        ctx: &RequestContext,
        caller_id: Uuid,
        post_id: Uuid,
    ) -> Result<Post, DomainError> {
        let post = self.get_post(ctx, post_id).await?;
        AuthorizationGuard::check(caller_id, &post)?;
        Ok(post)
    }

    #[tracing::instrument(skip(self, ctx, caller, changes), fields(caller_id = %caller.subject_id))]
    pub async fn update_post(
        &self,
        ctx: &RequestContext,
        caller: &TokenPayload,
        id: Uuid,
        changes: PostChanges,
    ) -> Result<Post, DomainError> {
        let current = self.authorize_post(ctx, caller.subject_id, id).await?;

        let changes = changes.against(&current);
        if changes.is_empty() {
            return Err(DomainError::NoChange);
        }

        let outcome = ctx
            .run(self.posts.update(id, changes))
            .await
            .and_then(|r| r.map_err(|e| DomainError::from_repo(e, "post", id)));
        let updated = match outcome {
            Ok(post) => post,
            Err(err) => {
                self.forget_post_after_failed_write(id, current.author_id, &err)
                    .await;
                return Err(err);
            }
        };

        tracing::info!(post_id = %id, "Post updated");
        self.refresh(&keys::post_key(id), &updated, self.cache.ttl().post)
            .await;
        self.invalidate_post_listings(updated.author_id).await;

        Ok(updated)
    }

    #[tracing::instrument(skip(self, ctx, caller), fields(caller_id = %caller.subject_id))]
    pub async fn delete_post(
        &self,
        ctx: &RequestContext,
        caller: &TokenPayload,
        id: Uuid,
    ) -> Result<(), DomainError> {
        let post = self.authorize_post(ctx, caller.subject_id, id).await?;

        let outcome = ctx
            .run(self.posts.delete(id))
            .await
            .and_then(|r| r.map_err(|e| DomainError::from_repo(e, "post", id)));
        if let Err(err) = outcome {
            self.forget_post_after_failed_write(id, post.author_id, &err)
                .await;
            return Err(err);
        }

        tracing::info!(post_id = %id, "Post deleted");
        self.evict(&keys::post_key(id)).await;
        self.invalidate_post_listings(post.author_id).await;

        Ok(())
    }

    /// Drop the post and its listings when a write ended without a confirmed outcome.
    async fn forget_post_after_failed_write(&self, id: Uuid, author_id: Uuid, err: &DomainError) {
        if unconfirmed(err) {
            tracing::warn!(post_id = %id, error = %err, "Post write unconfirmed, evicting cached copies");
            self.evict(&keys::post_key(id)).await;
            self.invalidate_post_listings(author_id).await;
        }
    }

    /// Listing pages can't be derived from a single post, so drop them by prefix.
    pub(super) async fn invalidate_post_listings(&self, author_id: Uuid) {
        self.evict_prefix(&keys::post_list_prefix()).await;
        self.evict_prefix(&keys::post_search_prefix()).await;
        self.evict_prefix(&keys::author_posts_prefix(author_id))
            .await;
    }
}
