//! The Result side of the mutation-serialization protocol

use crate::ids::{CorrelationId, UserId};
use crate::numeric::Quantity;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Status code of a processed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Success,
    AlreadyExists,
    UserNotFound,
    MarketNotFound,
    InsufficientBalance,
    InsufficientStock,
    /// Zero quantity or out-of-range price, rejected before any mutation.
    InvalidOrder,
    SellComplete,
    SellPartial,
    SellPlaced,
    BuyComplete,
    BuyPartial,
    BuyPlaced,
    Internal,
}

impl ResultStatus {
    /// Whether this status reports a rejection (domain error or internal
    /// fault). Rejected commands never mutate state.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ResultStatus::AlreadyExists
                | ResultStatus::UserNotFound
                | ResultStatus::MarketNotFound
                | ResultStatus::InsufficientBalance
                | ResultStatus::InsufficientStock
                | ResultStatus::InvalidOrder
                | ResultStatus::Internal
        )
    }
}

/// Outcome of one Command, keyed by its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub correlation_id: CorrelationId,
    pub status: ResultStatus,
    /// Per-counterparty filled quantity; empty for non-trade commands.
    #[serde(default)]
    pub fills: BTreeMap<UserId, Quantity>,
}

impl CommandResult {
    pub fn status(correlation_id: CorrelationId, status: ResultStatus) -> Self {
        Self {
            correlation_id,
            status,
            fills: BTreeMap::new(),
        }
    }

    pub fn with_fills(
        correlation_id: CorrelationId,
        status: ResultStatus,
        fills: BTreeMap<UserId, Quantity>,
    ) -> Self {
        Self {
            correlation_id,
            status,
            fills,
        }
    }

    /// Wire shape: a single-key mapping from the correlation id to either a
    /// bare status code or `{status, data}` with the fill map.
    pub fn to_wire(&self) -> Value {
        let body = if self.fills.is_empty() {
            json!(self.status)
        } else {
            json!({ "status": self.status, "data": self.fills })
        };
        json!({ self.correlation_id.as_str(): body })
    }
}
