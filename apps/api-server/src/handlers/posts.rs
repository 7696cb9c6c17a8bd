//! Post handlers.

use actix_web::{HttpResponse, web};

use quill_core::domain::{PostChanges, PostQuery};
use quill_shared::dto::{CreatePostRequest, ListPostsQuery, UpdatePostRequest};
use quill_shared::ApiResponse;

use super::{detached, page_of, parse_id, post_list, post_response};
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /v1/api/posts?q&skip&limit
///
/// A blank `q` lists everything; anything else searches titles.
pub async fn list_posts(
    state: web::Data<AppState>,
    query: web::Query<ListPostsQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    query.validate().map_err(AppError::Validation)?;

    let page = page_of(&query)?;
    let post_query = match query.term() {
        Some(term) => PostQuery::Search {
            term: term.to_string(),
            page,
        },
        None => PostQuery::All(page),
    };

    let posts = state
        .content
        .list_posts(&state.request_context(), &post_query)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(post_list(&query, &posts))))
}

/// POST /v1/api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    req.validate().map_err(AppError::Validation)?;

    let content = state.content.clone();
    let ctx = state.request_context();
    let post = detached(async move {
        content
            .create_post(&ctx, &identity.0, req.title, req.body)
            .await
    })
    .await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok(post_response(&post))))
}

/// GET /v1/api/posts/{id}
pub async fn get_post(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    let post = state.content.get_post(&state.request_context(), id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(post_response(&post))))
}

/// PUT /v1/api/posts/{id}
pub async fn update_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    let req = body.into_inner();
    let changes = PostChanges {
        title: req.title,
        body: req.body,
    };

    let content = state.content.clone();
    let ctx = state.request_context();
    let post = detached(async move { content.update_post(&ctx, &identity.0, id, changes).await })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(post_response(&post))))
}

/// DELETE /v1/api/posts/{id}
pub async fn delete_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    let content = state.content.clone();
    let ctx = state.request_context();
    detached(async move { content.delete_post(&ctx, &identity.0, id).await }).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::done()))
}
