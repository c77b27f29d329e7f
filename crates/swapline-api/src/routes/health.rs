//! Health check endpoint

use axum::{extract::State, Json};

use crate::dto::HealthResponse;
use crate::AppState;

/// GET /health - Check API health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let block = state.router().ledger().block().await;
    Json(HealthResponse::new(state.chain().chain_id.0, block.height))
}
