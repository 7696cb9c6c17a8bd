//! Bearer token extractor.

use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use quill_core::domain::TokenPayload;

use crate::middleware::error::AppError;
use crate::state::AppState;

/// The verified caller. Add it to a handler's arguments to require a token:
/// ```ignore
/// async fn protected_route(identity: Identity) -> impl Responder {
///     format!("Hello, {}!", identity.0.subject_name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Identity(pub TokenPayload);

/// Pull the token out of `Authorization: Bearer <token>`. The scheme is
/// matched case-insensitively.
fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Authorization header is missing".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

    match value.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AppError::Unauthorized("Expected Bearer token".to_string())),
    }
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            tracing::error!("AppState not found in app data");
            return ready(Err(AppError::Internal(
                "Server configuration error".to_string(),
            )));
        };

        let result = bearer_token(req).and_then(|token| {
            state
                .content
                .authenticate(token)
                .map(Identity)
                .map_err(AppError::from)
        });
        ready(result)
    }
}
