use crate::error::AppError;
use crate::handlers::submit;
use crate::models::OrderRequest;
use crate::state::AppState;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use types::command::CommandPayload;

pub async fn sell(
    State(state): State<AppState>,
    Json(payload): Json<OrderRequest>,
) -> Result<Response, AppError> {
    submit(
        &state,
        CommandPayload::Sell {
            user_id: payload.user_id,
            symbol: payload.stock_symbol,
            side: payload.stock_type,
            quantity: payload.quantity,
            price: payload.price,
        },
    )
    .await
}

pub async fn buy(
    State(state): State<AppState>,
    Json(payload): Json<OrderRequest>,
) -> Result<Response, AppError> {
    submit(
        &state,
        CommandPayload::Buy {
            user_id: payload.user_id,
            symbol: payload.stock_symbol,
            side: payload.stock_type,
            quantity: payload.quantity,
            price: payload.price,
        },
    )
    .await
}
