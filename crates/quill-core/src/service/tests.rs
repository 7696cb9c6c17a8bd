use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::cache::{CacheTtl, EntityCache, keys};
use crate::domain::{
    Page, Post, PostChanges, PostQuery, TokenPayload, User, UserChanges, UserPatch,
};
use crate::error::{DomainError, RepoError};
use crate::ports::{
    AuthError, BaseRepository, Cache, CacheError, PasswordService, PostRepository, TokenService,
    UserRepository,
};

use super::{ContentService, RequestContext};

// ---------------------------------------------------------------------------
// Port doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    sets: AtomicUsize,
    broken: AtomicBool,
    /// Prefix deletes remove one matching key, then fail like a dropped scan.
    scan_breaks: AtomicBool,
}

impl FakeCache {
    fn check(&self) -> Result<(), CacheError> {
        if self.broken.load(Ordering::SeqCst) {
            Err(CacheError::Connection("cache unreachable".into()))
        } else {
            Ok(())
        }
    }

    fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl Cache for FakeCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &[u8], _ttl: Option<Duration>) -> Result<(), CacheError> {
        self.check()?;
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.check()?;
        Ok(self.entries.lock().unwrap().contains_key(key))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        if self.scan_breaks.load(Ordering::SeqCst) {
            let first = entries.keys().find(|k| k.starts_with(prefix)).cloned();
            if let Some(key) = first {
                entries.remove(&key);
                return Err(CacheError::Connection("scan interrupted".into()));
            }
            return Ok(0);
        }
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
}

#[derive(Default)]
struct FakeStore {
    tables: Mutex<Tables>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    down: AtomicBool,
    delay: Mutex<Option<Duration>>,
    /// Writes commit, then take this long to acknowledge.
    ack_delay: Mutex<Option<Duration>>,
}

impl FakeStore {
    async fn enter(&self) -> Result<(), RepoError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(RepoError::Connection("store unreachable".into()));
        }
        Ok(())
    }

    async fn read(&self) -> Result<(), RepoError> {
        self.enter().await?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self) -> Result<(), RepoError> {
        self.enter().await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn acknowledge<T>(&self, result: Result<T, RepoError>) -> Result<T, RepoError> {
        let delay = *self.ack_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn seed_post(&self, post: Post) {
        self.tables.lock().unwrap().posts.insert(post.id, post);
    }

    fn post(&self, id: Uuid) -> Option<Post> {
        self.tables.lock().unwrap().posts.get(&id).cloned()
    }

    fn page(&self, mut posts: Vec<Post>, page: Page) -> Vec<Post> {
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect()
    }
}

#[async_trait]
impl BaseRepository<User, Uuid> for FakeStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.read().await?;
        Ok(self.tables.lock().unwrap().users.get(&id).cloned())
    }

    async fn create(&self, user: User) -> Result<User, RepoError> {
        self.write().await?;
        let mut tables = self.tables.lock().unwrap();
        if tables.users.values().any(|u| u.name == user.name) {
            return Err(RepoError::Constraint("user name already taken".into()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for FakeStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, RepoError> {
        self.read().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.values().find(|u| u.name == name).cloned())
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<User, RepoError> {
        self.write().await?;
        let result = (|| {
            let mut tables = self.tables.lock().unwrap();
            if let Some(name) = &patch.name {
                if tables.users.values().any(|u| u.id != id && &u.name == name) {
                    return Err(RepoError::Constraint("user name already taken".into()));
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
        })();
        self.acknowledge(result).await
    }

    async fn delete(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        self.write().await?;
        let result = (|| {
            let mut tables = self.tables.lock().unwrap();
            if tables.users.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            let owned: Vec<Uuid> = tables
                .posts
                .values()
                .filter(|p| p.author_id == id)
                .map(|p| p.id)
                .collect();
            for post_id in &owned {
                tables.posts.remove(post_id);
            }
            Ok(owned)
        })();
        self.acknowledge(result).await
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for FakeStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        self.read().await?;
        Ok(self.tables.lock().unwrap().posts.get(&id).cloned())
    }

    async fn create(&self, post: Post) -> Result<Post, RepoError> {
        self.write().await?;
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.contains_key(&post.author_id) {
            return Err(RepoError::Constraint("author does not exist".into()));
        }
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }
}

#[async_trait]
impl PostRepository for FakeStore {
    async fn list(&self, page: Page) -> Result<Vec<Post>, RepoError> {
        self.read().await?;
        let posts = self.tables.lock().unwrap().posts.values().cloned().collect();
        Ok(self.page(posts, page))
    }

    async fn search_by_title(&self, term: &str, page: Page) -> Result<Vec<Post>, RepoError> {
        self.read().await?;
        let posts = self
            .tables
            .lock()
            .unwrap()
            .posts
            .values()
            .filter(|p| p.title.contains(term))
            .cloned()
            .collect();
        Ok(self.page(posts, page))
    }

    async fn list_by_author(&self, author_id: Uuid, page: Page) -> Result<Vec<Post>, RepoError> {
        self.read().await?;
        let posts = self
            .tables
            .lock()
            .unwrap()
            .posts
            .values()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        Ok(self.page(posts, page))
    }

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Post, RepoError> {
        self.write().await?;
        let result = (|| {
            let mut tables = self.tables.lock().unwrap();
            let post = tables.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(title) = changes.title {
                post.title = title;
            }
            if let Some(body) = changes.body {
                post.body = body;
            }
            post.updated_at = Utc::now();
            Ok(post.clone())
        })();
        self.acknowledge(result).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.write().await?;
        let removed = self.tables.lock().unwrap().posts.remove(&id);
        let result = match removed {
            Some(_) => Ok(()),
            None => Err(RepoError::NotFound),
        };
        self.acknowledge(result).await
    }
}

#[derive(Default)]
struct PlainHasher {
    verifications: AtomicUsize,
}

impl PasswordService for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        Ok(format!("hashed:{password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        Ok(hash == format!("hashed:{password}"))
    }
}

struct FakeTokens;

impl TokenService for FakeTokens {
    fn create_token(&self, identity: &TokenPayload) -> Result<String, AuthError> {
        Ok(format!("token|{}|{}", identity.subject_id, identity.subject_name))
    }

    fn verify_token(&self, token: &str) -> Result<TokenPayload, AuthError> {
        let mut parts = token.split('|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("token"), Some(id), Some(name)) => Ok(TokenPayload {
                subject_id: Uuid::parse_str(id)
                    .map_err(|e| AuthError::InvalidToken(e.to_string()))?,
                subject_name: name.to_string(),
            }),
            _ => Err(AuthError::InvalidToken("malformed".into())),
        }
    }

    fn expiration_seconds(&self) -> i64 {
        3600
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    service: ContentService,
    store: Arc<FakeStore>,
    cache: Arc<FakeCache>,
    hasher: Arc<PlainHasher>,
    ctx: RequestContext,
}

fn harness() -> Harness {
    let store = Arc::new(FakeStore::default());
    let cache = Arc::new(FakeCache::default());
    let hasher = Arc::new(PlainHasher::default());
    let service = ContentService::new(
        store.clone(),
        store.clone(),
        EntityCache::new(cache.clone(), CacheTtl::default()),
        hasher.clone(),
        Arc::new(FakeTokens),
    );

    Harness {
        service,
        store,
        cache,
        hasher,
        ctx: RequestContext::new(),
    }
}

impl Harness {
    async fn user(&self, name: &str) -> TokenPayload {
        let user = self
            .service
            .create_user(&self.ctx, name.to_string(), "password123".to_string())
            .await
            .unwrap();
        TokenPayload::from(&user)
    }

    async fn post(&self, author: &TokenPayload, title: &str) -> Post {
        self.service
            .create_post(&self.ctx, author, title.to_string(), "body".to_string())
            .await
            .unwrap()
    }
}

fn page() -> Page {
    Page::new(1, 5).unwrap()
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cold_read_hits_store_once_then_serves_from_cache() {
    let h = harness();
    let post = Post::new(Uuid::new_v4(), "Seeded".into(), "body".into());
    h.store.seed_post(post.clone());

    let first = h.service.get_post(&h.ctx, post.id).await.unwrap();
    assert_eq!(first, post);
    assert_eq!(h.store.reads(), 1);
    assert_eq!(h.cache.sets.load(Ordering::SeqCst), 1);

    let second = h.service.get_post(&h.ctx, post.id).await.unwrap();
    assert_eq!(second, post);
    assert_eq!(h.store.reads(), 1);
}

#[tokio::test]
async fn missing_post_is_not_found_and_not_cached() {
    let h = harness();
    let id = Uuid::new_v4();

    let err = h.service.get_post(&h.ctx, id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { entity_type: "post", .. }));
    assert!(h.cache.raw(keys::post_key(id).as_str()).is_none());
}

#[tokio::test]
async fn cache_fault_falls_back_to_store() {
    let h = harness();
    let post = Post::new(Uuid::new_v4(), "Seeded".into(), "body".into());
    h.store.seed_post(post.clone());
    h.cache.broken.store(true, Ordering::SeqCst);

    let found = h.service.get_post(&h.ctx, post.id).await.unwrap();
    assert_eq!(found, post);
    assert_eq!(h.store.reads(), 1);
}

#[tokio::test]
async fn undecodable_entry_is_replaced_from_store() {
    let h = harness();
    let post = Post::new(Uuid::new_v4(), "Seeded".into(), "body".into());
    h.store.seed_post(post.clone());
    let key = keys::post_key(post.id);
    h.cache.set(key.as_str(), b"not json", None).await.unwrap();

    let found = h.service.get_post(&h.ctx, post.id).await.unwrap();
    assert_eq!(found, post);
    let cached: Post = serde_json::from_slice(&h.cache.raw(key.as_str()).unwrap()).unwrap();
    assert_eq!(cached, post);
}

#[tokio::test]
async fn store_failure_is_internal() {
    let h = harness();
    h.store.down.store(true, Ordering::SeqCst);

    let err = h.service.get_post(&h.ctx, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DomainError::Internal(_)));
}

#[tokio::test]
async fn empty_listing_is_not_found_and_not_cached() {
    let h = harness();
    let query = PostQuery::All(page());

    let err = h.service.list_posts(&h.ctx, &query).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
    assert!(h.cache.keys().is_empty());
}

#[tokio::test]
async fn listings_are_cached_per_query() {
    let h = harness();
    let author = h.user("writer").await;
    h.post(&author, "Rust ownership").await;
    h.post(&author, "Gardening").await;

    let search = PostQuery::Search {
        term: "Rust".into(),
        page: page(),
    };
    let found = h.service.list_posts(&h.ctx, &search).await.unwrap();
    assert_eq!(found.len(), 1);

    let reads = h.store.reads();
    let again = h.service.list_posts(&h.ctx, &search).await.unwrap();
    assert_eq!(again, found);
    assert_eq!(h.store.reads(), reads);

    let by_author = PostQuery::ByAuthor {
        author_id: author.subject_id,
        page: page(),
    };
    let mine = h.service.list_posts(&h.ctx, &by_author).await.unwrap();
    assert_eq!(mine.len(), 2);
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_post_is_readable_while_store_is_down() {
    let h = harness();
    let author = h.user("writer").await;
    let post = h.post(&author, "Fresh").await;

    h.store.down.store(true, Ordering::SeqCst);
    let found = h.service.get_post(&h.ctx, post.id).await.unwrap();
    assert_eq!(found, post);
}

#[tokio::test]
async fn post_for_unknown_author_is_conflict_and_leaves_cache_alone() {
    let h = harness();
    let ghost = TokenPayload {
        subject_id: Uuid::new_v4(),
        subject_name: "ghost".into(),
    };

    let err = h
        .service
        .create_post(&h.ctx, &ghost, "t".into(), "b".into())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
    assert_eq!(h.cache.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn owner_update_is_visible_without_store_round_trip() {
    let h = harness();
    let author = h.user("writer").await;
    let post = h.post(&author, "Old title").await;

    let updated = h
        .service
        .update_post(
            &h.ctx,
            &author,
            post.id,
            PostChanges {
                title: Some("New title".into()),
                body: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "New title");

    h.store.down.store(true, Ordering::SeqCst);
    let cached = h.service.get_post(&h.ctx, post.id).await.unwrap();
    assert_eq!(cached.title, "New title");
}

#[tokio::test]
async fn stranger_cannot_update_or_delete() {
    let h = harness();
    let author = h.user("writer").await;
    let stranger = h.user("stranger").await;
    let post = h.post(&author, "Mine").await;
    let writes = h.store.writes();

    let update = h
        .service
        .update_post(
            &h.ctx,
            &stranger,
            post.id,
            PostChanges {
                title: Some("Hijacked".into()),
                body: None,
            },
        )
        .await;
    assert_eq!(update.unwrap_err(), DomainError::Forbidden);

    let delete = h.service.delete_post(&h.ctx, &stranger, post.id).await;
    assert_eq!(delete.unwrap_err(), DomainError::Forbidden);
    assert_eq!(h.store.writes(), writes);
}

#[tokio::test]
async fn updating_missing_post_is_not_found_not_forbidden() {
    let h = harness();
    let author = h.user("writer").await;

    let err = h
        .service
        .update_post(
            &h.ctx,
            &author,
            Uuid::new_v4(),
            PostChanges {
                title: Some("x".into()),
                body: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn identical_post_update_is_no_change() {
    let h = harness();
    let author = h.user("writer").await;
    let post = h.post(&author, "Same").await;
    let writes = h.store.writes();

    let err = h
        .service
        .update_post(
            &h.ctx,
            &author,
            post.id,
            PostChanges {
                title: Some("Same".into()),
                body: Some("body".into()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::NoChange);
    assert_eq!(h.store.writes(), writes);
}

#[tokio::test]
async fn deleted_post_is_not_served_stale() {
    let h = harness();
    let author = h.user("writer").await;
    let post = h.post(&author, "Doomed").await;
    h.service.get_post(&h.ctx, post.id).await.unwrap();

    h.service
        .delete_post(&h.ctx, &author, post.id)
        .await
        .unwrap();

    let err = h.service.get_post(&h.ctx, post.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn post_update_drops_listing_pages() {
    let h = harness();
    let author = h.user("writer").await;
    let post = h.post(&author, "Rust tips").await;
    let search = PostQuery::Search {
        term: "Rust".into(),
        page: page(),
    };
    h.service.list_posts(&h.ctx, &search).await.unwrap();
    h.service
        .list_posts(&h.ctx, &PostQuery::All(page()))
        .await
        .unwrap();
    assert!(h.cache.raw(keys::post_query_key(&search).as_str()).is_some());

    h.service
        .update_post(
            &h.ctx,
            &author,
            post.id,
            PostChanges {
                title: Some("Go tips".into()),
                body: None,
            },
        )
        .await
        .unwrap();

    let remaining = h.cache.keys();
    assert!(remaining.iter().all(|k| !k.starts_with(&keys::post_search_prefix())));
    assert!(remaining.iter().all(|k| !k.starts_with(&keys::post_list_prefix())));

    let err = h.service.list_posts(&h.ctx, &search).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn failed_invalidation_still_reports_success() {
    let h = harness();
    let author = h.user("writer").await;
    let post = h.post(&author, "Doomed").await;
    h.cache.broken.store(true, Ordering::SeqCst);

    let result = h.service.delete_post(&h.ctx, &author, post.id).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn interrupted_prefix_scan_still_reports_success() {
    let h = harness();
    let author = h.user("writer").await;
    let post = h.post(&author, "Rust tips").await;
    h.post(&author, "Rust again").await;
    h.service
        .list_posts(&h.ctx, &PostQuery::All(page()))
        .await
        .unwrap();
    h.service
        .list_posts(&h.ctx, &PostQuery::All(Page::new(1, 10).unwrap()))
        .await
        .unwrap();
    h.cache.scan_breaks.store(true, Ordering::SeqCst);

    let updated = h
        .service
        .update_post(
            &h.ctx,
            &author,
            post.id,
            PostChanges {
                title: Some("Go tips".into()),
                body: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Go tips");

    let listings = h
        .cache
        .keys()
        .into_iter()
        .filter(|k| k.starts_with(&keys::post_list_prefix()))
        .count();
    assert_eq!(listings, 1);

    h.store.down.store(true, Ordering::SeqCst);
    let cached = h.service.get_post(&h.ctx, post.id).await.unwrap();
    assert_eq!(cached.title, "Go tips");
}

// ---------------------------------------------------------------------------
// Users and identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cached_user_never_carries_password_hash() {
    let h = harness();
    let created = h
        .service
        .create_user(&h.ctx, "laplala".into(), "password123".into())
        .await
        .unwrap();
    assert!(created.password_hash.is_empty());

    let raw = h.cache.raw(keys::user_key(created.id).as_str()).unwrap();
    let text = String::from_utf8(raw).unwrap();
    assert!(!text.contains("hashed:"));
}

#[tokio::test]
async fn duplicate_user_name_is_conflict() {
    let h = harness();
    h.user("laplala").await;
    let sets = h.cache.sets.load(Ordering::SeqCst);

    let err = h
        .service
        .create_user(&h.ctx, "laplala".into(), "password123".into())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
    assert_eq!(h.cache.sets.load(Ordering::SeqCst), sets);
}

#[tokio::test]
async fn same_name_and_empty_password_is_no_change() {
    let h = harness();
    let me = h.user("laplala").await;
    let writes = h.store.writes();

    let err = h
        .service
        .update_user(
            &h.ctx,
            &me,
            me.subject_id,
            UserChanges {
                name: Some("laplala".into()),
                password: Some(String::new()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::NoChange);
    assert_eq!(h.store.writes(), writes);
}

#[tokio::test]
async fn rename_refreshes_cache_and_allows_login_with_new_name() {
    let h = harness();
    let me = h.user("laplala").await;

    let renamed = h
        .service
        .update_user(
            &h.ctx,
            &me,
            me.subject_id,
            UserChanges {
                name: Some("lalaland".into()),
                password: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "lalaland");
    assert!(renamed.password_hash.is_empty());

    h.store.down.store(true, Ordering::SeqCst);
    let cached = h.service.get_user(&h.ctx, me.subject_id).await.unwrap();
    assert_eq!(cached.name, "lalaland");
    h.store.down.store(false, Ordering::SeqCst);

    let token = h
        .service
        .login(&h.ctx, "lalaland", "password123")
        .await
        .unwrap();
    assert_eq!(h.service.authenticate(&token).unwrap().subject_id, me.subject_id);
}

#[tokio::test]
async fn updating_someone_else_is_forbidden() {
    let h = harness();
    let me = h.user("laplala").await;
    let other = h.user("other").await;

    let err = h
        .service
        .update_user(
            &h.ctx,
            &me,
            other.subject_id,
            UserChanges {
                name: Some("mine now".into()),
                password: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::Forbidden);
}

#[tokio::test]
async fn deleting_user_evicts_their_posts() {
    let h = harness();
    let me = h.user("laplala").await;
    let post = h.post(&me, "Mine").await;
    h.service.get_post(&h.ctx, post.id).await.unwrap();
    h.service
        .list_posts(
            &h.ctx,
            &PostQuery::ByAuthor {
                author_id: me.subject_id,
                page: page(),
            },
        )
        .await
        .unwrap();

    h.service
        .delete_user(&h.ctx, &me, me.subject_id)
        .await
        .unwrap();

    assert!(h.cache.raw(keys::user_key(me.subject_id).as_str()).is_none());
    assert!(h.cache.raw(keys::post_key(post.id).as_str()).is_none());
    assert!(
        h.cache
            .keys()
            .iter()
            .all(|k| !k.starts_with(&keys::author_posts_prefix(me.subject_id)))
    );
    let err = h.service.get_post(&h.ctx, post.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let h = harness();
    h.user("realuser").await;

    let before = h.hasher.verifications.load(Ordering::SeqCst);
    let ghost = h.service.login(&h.ctx, "ghost", "x").await.unwrap_err();
    let after_ghost = h.hasher.verifications.load(Ordering::SeqCst);
    let wrong = h
        .service
        .login(&h.ctx, "realuser", "wrongpass")
        .await
        .unwrap_err();
    let after_wrong = h.hasher.verifications.load(Ordering::SeqCst);

    assert_eq!(ghost, DomainError::InvalidCredentials);
    assert_eq!(wrong, ghost);
    assert_eq!(after_ghost - before, 1);
    assert_eq!(after_wrong - after_ghost, 1);
}

#[tokio::test]
async fn successful_login_issues_token_for_user() {
    let h = harness();
    let me = h.user("realuser").await;

    let token = h
        .service
        .login(&h.ctx, "realuser", "password123")
        .await
        .unwrap();
    let payload = h.service.authenticate(&token).unwrap();
    assert_eq!(payload, me);
}

#[test]
fn bad_token_is_unauthorized() {
    let h = harness();
    assert_eq!(
        h.service.authenticate("garbage").unwrap_err(),
        DomainError::Unauthorized
    );
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_request_never_reaches_store() {
    let h = harness();
    let ctx = RequestContext::new();
    ctx.cancel();

    let err = h.service.get_post(&ctx, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err, DomainError::Cancelled);
    assert_eq!(h.store.reads(), 0);
}

#[tokio::test]
async fn slow_store_hits_deadline() {
    let h = harness();
    *h.store.delay.lock().unwrap() = Some(Duration::from_secs(5));
    let ctx = RequestContext::with_timeout(Duration::from_millis(20));

    let err = h.service.get_post(&ctx, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err, DomainError::Cancelled);
}

/// A post that is cached, plus a request context that expires while the store
/// is still acknowledging a write it has already committed.
async fn slow_ack_setup() -> (Harness, TokenPayload, Post, RequestContext) {
    let h = harness();
    let author = h.user("writer").await;
    let post = h.post(&author, "old").await;
    h.service
        .list_posts(&h.ctx, &PostQuery::All(page()))
        .await
        .unwrap();
    *h.store.ack_delay.lock().unwrap() = Some(Duration::from_millis(200));
    let ctx = RequestContext::with_timeout(Duration::from_millis(50));
    (h, author, post, ctx)
}

#[tokio::test]
async fn cancelled_update_after_commit_does_not_serve_stale_post() {
    let (h, author, post, ctx) = slow_ack_setup().await;

    let err = h
        .service
        .update_post(
            &ctx,
            &author,
            post.id,
            PostChanges {
                title: Some("new".into()),
                body: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::Cancelled);
    assert_eq!(h.store.post(post.id).unwrap().title, "new");
    *h.store.ack_delay.lock().unwrap() = None;

    assert!(h.cache.raw(keys::post_key(post.id).as_str()).is_none());
    assert!(h.cache.keys().iter().all(|k| !k.starts_with(&keys::post_list_prefix())));
    let served = h.service.get_post(&h.ctx, post.id).await.unwrap();
    assert_eq!(served.title, "new");
}

#[tokio::test]
async fn cancelled_delete_after_commit_does_not_serve_deleted_post() {
    let (h, author, post, ctx) = slow_ack_setup().await;

    let err = h
        .service
        .delete_post(&ctx, &author, post.id)
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::Cancelled);
    assert!(h.store.post(post.id).is_none());
    *h.store.ack_delay.lock().unwrap() = None;

    let err = h.service.get_post(&h.ctx, post.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn retried_delete_of_vanished_post_evicts_cached_copy() {
    let h = harness();
    let author = h.user("writer").await;
    let post = h.post(&author, "old").await;
    // Gone from the store while the cached copy lingers.
    h.store.tables.lock().unwrap().posts.remove(&post.id);

    let err = h
        .service
        .delete_post(&h.ctx, &author, post.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));

    let err = h.service.get_post(&h.ctx, post.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn cancelled_user_update_after_commit_evicts_user() {
    let (h, author, _, ctx) = slow_ack_setup().await;

    let err = h
        .service
        .update_user(
            &ctx,
            &author,
            author.subject_id,
            UserChanges {
                name: Some("renamed".into()),
                password: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::Cancelled);
    *h.store.ack_delay.lock().unwrap() = None;

    let served = h.service.get_user(&h.ctx, author.subject_id).await.unwrap();
    assert_eq!(served.name, "renamed");
}

#[tokio::test]
async fn cancelled_user_delete_after_commit_evicts_cascaded_posts() {
    let (h, author, post, ctx) = slow_ack_setup().await;

    let err = h
        .service
        .delete_user(&ctx, &author, author.subject_id)
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::Cancelled);
    *h.store.ack_delay.lock().unwrap() = None;

    let err = h.service.get_post(&h.ctx, post.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
    let err = h.service.get_user(&h.ctx, author.subject_id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}
