use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Page, Post, PostChanges, User, UserPatch};
use crate::error::RepoError;

/// Operations every store-backed entity supports.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Insert a new entity. Unique or foreign key violations are `Constraint`.
    async fn create(&self, entity: T) -> Result<T, RepoError>;
}

/// User repository with domain-specific methods.
#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    /// Find a user by their unique name, password hash included.
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, RepoError>;

    /// Merge the present fields of `patch` into the stored user.
    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<User, RepoError>;

    /// Delete a user together with their posts in one transaction.
    ///
    /// Returns the ids of the posts removed by the cascade.
    async fn delete(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError>;
}

/// Post repository.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    /// Newest posts first.
    async fn list(&self, page: Page) -> Result<Vec<Post>, RepoError>;

    /// Posts whose title contains `term`.
    async fn search_by_title(&self, term: &str, page: Page) -> Result<Vec<Post>, RepoError>;

    async fn list_by_author(&self, author_id: Uuid, page: Page) -> Result<Vec<Post>, RepoError>;

    /// Merge the present fields of `changes` into the stored post.
    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, RepoError>;

    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;
}
