//! Owner-gated administration and fee bookkeeping

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use amm::{ConcentratedLiquidityAdapter, ConstantProductAdapter};
use swapline_core::Address;

use super::{bad_request, router_error, ApiResult};
use crate::dto::{AccruedFeesResponse, AdminResponse, SetAdaptersRequest, SetFeeRequest};
use crate::AppState;

/// Create admin routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fee", post(set_fee))
        .route("/adapters", post(set_adapters))
}

/// POST /admin/fee - Change the protocol fee and treasury
async fn set_fee(
    State(state): State<AppState>,
    Json(request): Json<SetFeeRequest>,
) -> ApiResult<AdminResponse> {
    state
        .router()
        .set_fee(&request.caller, request.bps, request.treasury)
        .await
        .map_err(router_error)?;
    Ok(Json(AdminResponse { ok: true }))
}

/// POST /admin/adapters - Replace both pool adapters
async fn set_adapters(
    State(state): State<AppState>,
    Json(request): Json<SetAdaptersRequest>,
) -> ApiResult<AdminResponse> {
    let max_slices = request
        .max_slices
        .unwrap_or(state.engine().config().max_cl_slices);
    state
        .router()
        .set_adapters(
            &request.caller,
            ConcentratedLiquidityAdapter {
                address: request.concentrated_liquidity,
                max_slices,
            },
            ConstantProductAdapter {
                address: request.constant_product,
            },
        )
        .await
        .map_err(router_error)?;
    Ok(Json(AdminResponse { ok: true }))
}

/// GET /fees/accrued/:token - Protocol fees settled in `token`
pub async fn accrued_fees(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<AccruedFeesResponse> {
    let token = Address::parse(&token).map_err(|e| bad_request(e.to_string()))?;
    let amount = state.router().fees().accrued(&token).await;
    Ok(Json(AccruedFeesResponse { token, amount }))
}
