//! HTTP handlers and route configuration.

mod auth;
mod health;
mod posts;
mod users;

use std::future::Future;

use actix_web::web;
use uuid::Uuid;

use quill_core::DomainError;
use quill_core::domain::{Page, Post, User};
use quill_shared::ListMeta;
use quill_shared::dto::{ListPostsQuery, PostListResponse, PostResponse, UserResponse};

use crate::middleware::error::{AppError, AppResult};

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1/api")
            .route("/health", web::get().to(health::health_check))
            .service(web::scope("/auth").route("/login", web::post().to(auth::login)))
            .service(
                web::scope("/users")
                    .route("", web::post().to(users::create_user))
                    .route("/{id}", web::get().to(users::get_user))
                    .route("/{id}", web::put().to(users::update_user))
                    .route("/{id}", web::delete().to(users::delete_user))
                    .route("/{id}/posts", web::get().to(users::list_user_posts)),
            )
            .service(
                web::scope("/posts")
                    .route("", web::get().to(posts::list_posts))
                    .route("", web::post().to(posts::create_post))
                    .route("/{id}", web::get().to(posts::get_post))
                    .route("/{id}", web::put().to(posts::update_post))
                    .route("/{id}", web::delete().to(posts::delete_post)),
            ),
    );
}

fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("'{raw}' is not a valid id")))
}

/// Turn a 0-based HTTP page into the core's 1-based one.
fn page_of(query: &ListPostsQuery) -> AppResult<Page> {
    query
        .skip
        .checked_add(1)
        .ok_or_else(|| DomainError::Validation("skip is out of range".to_string()))
        .and_then(|skip| Page::new(skip, query.limit))
        .map_err(|e| match e {
            DomainError::Validation(msg) => AppError::Validation(vec![msg]),
            other => other.into(),
        })
}

/// Run a write on its own task so a client disconnect can't interrupt it
/// between the store commit and the cache maintenance that follows.
async fn detached<T, F>(fut: F) -> AppResult<T>
where
    T: 'static,
    F: Future<Output = Result<T, DomainError>> + 'static,
{
    actix_web::rt::spawn(fut)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::from)
}

fn user_response(user: &User) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.name.clone(),
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

fn post_response(post: &Post) -> PostResponse {
    PostResponse {
        id: post.id,
        author_id: post.author_id,
        title: post.title.clone(),
        body: post.body.clone(),
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

fn post_list(query: &ListPostsQuery, posts: &[Post]) -> PostListResponse {
    PostListResponse {
        meta: ListMeta {
            count: posts.len(),
            skip: query.skip,
            limit: query.limit,
        },
        posts: posts.iter().map(post_response).collect(),
    }
}
