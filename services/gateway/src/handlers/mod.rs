pub mod account;
pub mod market;
pub mod order;
pub mod views;

use crate::error::AppError;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::time::timeout;
use types::command::{Command, CommandPayload};
use types::ids::CorrelationId;
use types::result::ResultStatus;

/// Subscribe, enqueue, and wait for the correlated result.
///
/// The subscription is registered before the command is journaled, so the
/// worker cannot publish a result the caller would miss. On timeout the
/// waiter is dropped and the outcome reported as unknown; the command may
/// still be applied.
pub(crate) async fn submit(
    state: &AppState,
    payload: CommandPayload,
) -> Result<Response, AppError> {
    let command = Command::new(CorrelationId::generate(), payload);
    let channel = command.channel();
    let correlation_id = command.correlation_id.clone();

    let rx = state.bus.subscribe(channel, correlation_id.clone());
    if let Err(e) = state.queue.enqueue(command).await {
        // Nothing will ever publish for this command; drop the waiter.
        state.bus.unsubscribe(channel, &correlation_id);
        tracing::error!(%correlation_id, channel, error = %e, "failed to enqueue command");
        return Err(AppError::PipelineUnavailable);
    }

    match timeout(state.request_timeout, rx).await {
        Ok(Ok(result)) => Ok((http_status(result.status), Json(result.to_wire())).into_response()),
        Ok(Err(_)) => Err(AppError::InternalError(anyhow::anyhow!(
            "worker dropped result channel"
        ))),
        Err(_) => {
            state.bus.unsubscribe(channel, &correlation_id);
            tracing::warn!(%correlation_id, channel, "timed out waiting for command result");
            Err(AppError::OutcomeUnknown)
        }
    }
}

fn http_status(status: ResultStatus) -> StatusCode {
    match status {
        ResultStatus::Success
        | ResultStatus::SellComplete
        | ResultStatus::SellPartial
        | ResultStatus::SellPlaced
        | ResultStatus::BuyComplete
        | ResultStatus::BuyPartial
        | ResultStatus::BuyPlaced => StatusCode::OK,
        ResultStatus::AlreadyExists => StatusCode::CONFLICT,
        ResultStatus::UserNotFound | ResultStatus::MarketNotFound => StatusCode::NOT_FOUND,
        ResultStatus::InsufficientBalance
        | ResultStatus::InsufficientStock
        | ResultStatus::InvalidOrder => StatusCode::BAD_REQUEST,
        ResultStatus::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matching_engine::MarketStore;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::RwLock;
    use types::ids::UserId;
    use worker::{CommandQueue, NotificationBus};

    #[tokio::test]
    async fn test_failed_enqueue_drops_the_waiter() {
        let tmp = TempDir::new().unwrap();
        let (queue, rx) = CommandQueue::open(&tmp.path().join("queue"), 4).unwrap();
        // No worker: enqueue can journal but never hand the command over.
        drop(rx);

        let bus = Arc::new(NotificationBus::new());
        let state = AppState {
            queue,
            bus: Arc::clone(&bus),
            view: Arc::new(RwLock::new(MarketStore::new())),
            request_timeout: Duration::from_secs(5),
        };

        let result = submit(
            &state,
            CommandPayload::CreateUser {
                user_id: UserId::new("alice"),
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::PipelineUnavailable)));
        assert_eq!(bus.waiter_count(), 0, "no waiter survives a failed enqueue");
    }
}
