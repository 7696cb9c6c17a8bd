//! PostgreSQL repository implementations.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use quill_core::domain::{Page, Post, PostChanges, User, UserPatch};
use quill_core::error::RepoError;
use quill_core::ports::{PostRepository, UserRepository};

use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, map_db_err};

/// PostgreSQL user repository.
pub type PostgresUserRepository = PostgresBaseRepository<UserEntity>;

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, RepoError> {
        let result = UserEntity::find()
            .filter(user::Column::Name.eq(name))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<User, RepoError> {
        let model = UserEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(RepoError::NotFound)?;

        let mut active = model.into_active_model();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(hash) = patch.password_hash {
            active.password_hash = Set(hash);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(&self.db).await.map_err(map_db_err)?;
        Ok(updated.into())
    }

    async fn delete(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let post_ids: Vec<Uuid> = PostEntity::find()
            .select_only()
            .column(post::Column::Id)
            .filter(post::Column::AuthorId.eq(id))
            .into_tuple()
            .all(&txn)
            .await
            .map_err(map_db_err)?;

        PostEntity::delete_many()
            .filter(post::Column::AuthorId.eq(id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        let result = UserEntity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        // Dropping the transaction rolls the post deletion back
        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        txn.commit().await.map_err(map_db_err)?;
        Ok(post_ids)
    }
}

impl PostgresPostRepository {
    async fn fetch_page(&self, select: Select<PostEntity>, page: Page) -> Result<Vec<Post>, RepoError> {
        let models = select
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn list(&self, page: Page) -> Result<Vec<Post>, RepoError> {
        self.fetch_page(PostEntity::find(), page).await
    }

    async fn search_by_title(&self, term: &str, page: Page) -> Result<Vec<Post>, RepoError> {
        self.fetch_page(
            PostEntity::find().filter(post::Column::Title.contains(term)),
            page,
        )
        .await
    }

    async fn list_by_author(&self, author_id: Uuid, page: Page) -> Result<Vec<Post>, RepoError> {
        self.fetch_page(
            PostEntity::find().filter(post::Column::AuthorId.eq(author_id)),
            page,
        )
        .await
    }

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, RepoError> {
        let model = PostEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(RepoError::NotFound)?;

        let mut active = model.into_active_model();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(body) = changes.body {
            active.body = Set(body);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(&self.db).await.map_err(map_db_err)?;
        Ok(updated.into())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let result = PostEntity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }
}
