//! Read-only queries served from the worker-maintained view. These never
//! touch the command pipeline, so they are eventually consistent with the
//! most recently applied command.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

pub async fn inr_balances(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let view = state.view.read().await;
    let body = serde_json::to_value(view.users()).map_err(anyhow::Error::from)?;
    Ok(Json(body))
}

pub async fn stock_balances(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let view = state.view.read().await;
    let body = serde_json::to_value(view.portfolios()).map_err(anyhow::Error::from)?;
    Ok(Json(body))
}

pub async fn orderbook(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let view = state.view.read().await;
    let body = serde_json::to_value(view.books()).map_err(anyhow::Error::from)?;
    Ok(Json(body))
}
