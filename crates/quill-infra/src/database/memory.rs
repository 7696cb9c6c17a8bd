//! In-memory store - used when no database is configured, and in tests.
//!
//! Mirrors the relational constraints: user names are unique, posts need an
//! existing author, and deleting a user removes their posts atomically.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Page, Post, PostChanges, User, UserPatch};
use quill_core::error::RepoError;
use quill_core::ports::{BaseRepository, PostRepository, UserRepository};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
}

impl Tables {
    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.name == name && Some(u.id) != except)
    }

    fn page<'a>(&'a self, filter: impl Fn(&Post) -> bool + 'a, page: Page) -> Vec<Post> {
        let mut posts: Vec<&Post> = self.posts.values().filter(|p| filter(p)).collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect()
    }
}

/// Shared tables; hand out repositories with [`InMemoryStore::users`] and
/// [`InMemoryStore::posts`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> InMemoryUserRepository {
        InMemoryUserRepository {
            tables: self.tables.clone(),
        }
    }

    pub fn posts(&self) -> InMemoryPostRepository {
        InMemoryPostRepository {
            tables: self.tables.clone(),
        }
    }
}

pub struct InMemoryUserRepository {
    tables: Arc<RwLock<Tables>>,
}

pub struct InMemoryPostRepository {
    tables: Arc<RwLock<Tables>>,
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) || tables.name_taken(&user.name, None) {
            return Err(RepoError::Constraint(format!(
                "user name '{}' already exists",
                user.name
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.name == name).cloned())
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if let Some(name) = &patch.name {
            if tables.name_taken(name, Some(id)) {
                return Err(RepoError::Constraint(format!(
                    "user name '{name}' already exists"
                )));
            }
        }

        let user = tables.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }

        let mut removed = Vec::new();
        tables.posts.retain(|post_id, post| {
            if post.author_id == id {
                removed.push(*post_id);
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn create(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&post.author_id) {
            return Err(RepoError::Constraint(format!(
                "author {} does not exist",
                post.author_id
            )));
        }
        if tables.posts.contains_key(&post.id) {
            return Err(RepoError::Constraint(format!("post {} already exists", post.id)));
        }
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn list(&self, page: Page) -> Result<Vec<Post>, RepoError> {
        Ok(self.tables.read().await.page(|_| true, page))
    }

    async fn search_by_title(&self, term: &str, page: Page) -> Result<Vec<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.page(|p| p.title.contains(term), page))
    }

    async fn list_by_author(&self, author_id: Uuid, page: Page) -> Result<Vec<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.page(move |p| p.author_id == author_id, page))
    }

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        let post = tables.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(body) = changes.body {
            post.body = body;
        }
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        match self.tables.write().await.posts.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepoError::NotFound),
        }
    }
}
