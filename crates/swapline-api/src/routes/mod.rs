//! API route handlers

pub mod admin;
pub mod health;
pub mod pools;
pub mod quote;
pub mod swap;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use swapline_core::RouterError;

use crate::dto::ApiError;
use crate::AppState;

/// Handler result: JSON body or a status with an error body
pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// Map an engine error to its HTTP status and stable error code.
pub fn router_error(err: RouterError) -> (StatusCode, Json<ApiError>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiError::from(&err)))
}

pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError::bad_request(message)))
}

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/quote", post(quote::get_quote))
        .route("/swap", post(swap::swap))
        .route("/execute", post(swap::execute))
        .route("/pools/:address", get(pools::get_pool))
        .route("/fees/accrued/:token", get(admin::accrued_fees))
        .nest("/admin", admin::router())
        .with_state(state)
}
