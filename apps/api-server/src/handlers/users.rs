//! User handlers.

use actix_web::{HttpResponse, web};

use quill_core::domain::{PostQuery, UserChanges};
use quill_shared::dto::{CreateUserRequest, ListPostsQuery, UpdateUserRequest};
use quill_shared::ApiResponse;

use super::{detached, page_of, parse_id, post_list, user_response};
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /v1/api/users
pub async fn create_user(
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    req.validate().map_err(AppError::Validation)?;

    let content = state.content.clone();
    let ctx = state.request_context();
    let user = detached(async move {
        content
            .create_user(&ctx, req.username, req.password)
            .await
    })
    .await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok(user_response(&user))))
}

/// GET /v1/api/users/{id}
pub async fn get_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    let user = state.content.get_user(&state.request_context(), id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(user_response(&user))))
}

/// PUT /v1/api/users/{id}
pub async fn update_user(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    body: web::Json<UpdateUserRequest>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    let req = body.into_inner();
    req.validate().map_err(AppError::Validation)?;

    let changes = UserChanges {
        name: req.username,
        password: req.password,
    };
    let content = state.content.clone();
    let ctx = state.request_context();
    let user = detached(async move { content.update_user(&ctx, &identity.0, id, changes).await })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(user_response(&user))))
}

/// DELETE /v1/api/users/{id}
pub async fn delete_user(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    let content = state.content.clone();
    let ctx = state.request_context();
    detached(async move { content.delete_user(&ctx, &identity.0, id).await }).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::done()))
}

/// GET /v1/api/users/{id}/posts
pub async fn list_user_posts(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListPostsQuery>,
) -> AppResult<HttpResponse> {
    let author_id = parse_id(&path)?;
    let query = query.into_inner();
    query.validate().map_err(AppError::Validation)?;

    let page = page_of(&query)?;
    let posts = state
        .content
        .list_posts(
            &state.request_context(),
            &PostQuery::ByAuthor { author_id, page },
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(post_list(&query, &posts))))
}
