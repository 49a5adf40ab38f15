use crate::error::AppError;
use crate::handlers::submit;
use crate::models::MintRequest;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use types::command::CommandPayload;
use types::ids::MarketSymbol;

pub async fn create_symbol(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Response, AppError> {
    submit(
        &state,
        CommandPayload::CreateMarket {
            symbol: MarketSymbol::new(symbol),
        },
    )
    .await
}

pub async fn mint(
    State(state): State<AppState>,
    Json(payload): Json<MintRequest>,
) -> Result<Response, AppError> {
    submit(
        &state,
        CommandPayload::Mint {
            user_id: payload.user_id,
            symbol: payload.stock_symbol,
            quantity: payload.quantity,
            price: payload.price,
        },
    )
    .await
}

/// Full state wipe. Goes through the queue like any other mutation so the
/// single-writer property holds even for test tooling.
pub async fn reset(State(state): State<AppState>) -> Result<Response, AppError> {
    submit(&state, CommandPayload::Reset).await
}
