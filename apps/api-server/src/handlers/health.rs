//! Liveness endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::{AppState, Backends};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Which store and cache this process ended up wired to.
    pub backends: Backends,
    pub timestamp: String,
}

/// GET /v1/api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backends: state.backends,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
