//! Authentication handlers.

use actix_web::{HttpResponse, web};

use quill_shared::ApiResponse;
use quill_shared::dto::{AuthResponse, LoginRequest};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /v1/api/auth/login
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    req.validate().map_err(AppError::Validation)?;

    let ctx = state.request_context();
    let token = state
        .content
        .login(&ctx, &req.username, &req.password)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(AuthResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.content.token_lifetime_seconds().max(0) as u64,
    })))
}
