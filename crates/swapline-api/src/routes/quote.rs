//! Quote endpoint

use axum::{extract::State, Json};
use amm::QuoteRequest;
use swapline_core::ChainId;

use super::{router_error, ApiResult};
use crate::dto::{QuoteApiRequest, QuoteResponse};
use crate::AppState;

/// POST /quote - Best route and price metrics for a conversion
pub async fn get_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteApiRequest>,
) -> ApiResult<QuoteResponse> {
    let request = QuoteRequest {
        chain_id: ChainId(request.chain_id),
        token_in: request.token_in,
        token_out: request.token_out,
        amount: request.amount,
        mode: request.mode,
        allow_partial: request.allow_partial,
    };
    let quote = state.engine().quote(&request).await.map_err(router_error)?;
    let quote_id = state.store_quote(quote.clone()).await;
    Ok(Json(QuoteResponse::new(quote_id, &quote)))
}
