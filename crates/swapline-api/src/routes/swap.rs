//! Execution endpoints

use axum::{extract::State, http::StatusCode, Json};
use amm::{ExecutionRequest, Quote, QuoteRequest, SwapBounds, SwapMode};

use super::{bad_request, router_error, ApiResult};
use crate::dto::{ApiError, ExecuteApiRequest, SwapApiRequest, SwapReceiptResponse};
use crate::AppState;

/// Stored quote for `id`, refreshed if its validity window has passed
async fn stored_quote(
    state: &AppState,
    id: &str,
    request: &SwapApiRequest,
) -> Result<Quote, (StatusCode, Json<ApiError>)> {
    let quote = state.quote(id).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(format!("Quote not found: {}", id))),
        )
    })?;
    let requested = match quote.mode {
        SwapMode::ExactIn => quote.amount_in,
        SwapMode::ExactOut => quote.amount_out,
    };
    if quote.route.token_in() != &request.token_in
        || quote.route.token_out() != &request.token_out
        || quote.mode != request.mode
        || requested != request.amount
    {
        return Err(bad_request(format!("quote {} does not match the swap request", id)));
    }
    state.engine().refresh(quote).await.map_err(router_error)
}

/// POST /swap - Quote (or reuse a stored quote) and execute atomically
pub async fn swap(
    State(state): State<AppState>,
    Json(request): Json<SwapApiRequest>,
) -> ApiResult<SwapReceiptResponse> {
    let quote = match request.quote_id.as_deref() {
        Some(id) => stored_quote(&state, id, &request).await?,
        None => {
            let quote_request = QuoteRequest {
                chain_id: state.engine().chain_id(),
                token_in: request.token_in.clone(),
                token_out: request.token_out.clone(),
                amount: request.amount,
                mode: request.mode,
                allow_partial: None,
            };
            state
                .engine()
                .quote(&quote_request)
                .await
                .map_err(router_error)?
        }
    };

    let execution = ExecutionRequest::from_quote(
        &quote,
        request.caller,
        request.recipient,
        request.deadline,
        request.max_slippage_bps,
        request.pay_native,
    )
    .map_err(router_error)?;
    let receipt = state.router().swap(&execution).await.map_err(router_error)?;
    Ok(Json(receipt.into()))
}

/// POST /execute - Run a caller-chosen route with explicit bounds
pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteApiRequest>,
) -> ApiResult<SwapReceiptResponse> {
    let execution = ExecutionRequest {
        caller: request.caller,
        route: request.route,
        bounds: SwapBounds::ExactIn {
            amount_in: request.amount_in,
            min_amount_out: request.min_amount_out,
        },
        recipient: request.recipient,
        deadline: request.deadline,
        value: request.value,
        sqrt_price_limits: Vec::new(),
    };
    let receipt = state.router().swap(&execution).await.map_err(router_error)?;
    Ok(Json(receipt.into()))
}
