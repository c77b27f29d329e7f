//! Pool state lookup

use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use chain_client::{timed_request, PoolSnapshot};
use swapline_core::{Address, RouterError};

use super::{bad_request, router_error, ApiResult};
use crate::AppState;

/// GET /pools/:address - Live state of one pool
pub async fn get_pool(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<PoolSnapshot> {
    let address = Address::parse(&address).map_err(|e| bad_request(e.to_string()))?;
    let engine = state.engine();
    let timeout = Duration::from_millis(engine.config().fetch_timeout_ms);

    let snapshot = timed_request(timeout, engine.provider().pool_state(&address))
        .await
        .map_err(|e| router_error(RouterError::from(e)))?;
    Ok(Json(snapshot))
}
