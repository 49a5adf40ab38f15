use crate::error::AppError;
use crate::handlers::submit;
use crate::models::OnrampRequest;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use types::command::CommandPayload;
use types::ids::UserId;

pub async fn create_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, AppError> {
    submit(
        &state,
        CommandPayload::CreateUser {
            user_id: UserId::new(user_id),
        },
    )
    .await
}

pub async fn onramp(
    State(state): State<AppState>,
    Json(payload): Json<OnrampRequest>,
) -> Result<Response, AppError> {
    submit(
        &state,
        CommandPayload::OnrampCurrency {
            user_id: payload.user_id,
            amount: payload.amount,
        },
    )
    .await
}
