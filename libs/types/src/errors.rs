//! Domain error taxonomy
//!
//! Domain errors are detected before any mutation and reported as Result
//! statuses; they never leave state inconsistent and are never retried.
//! Hard failures are reserved for truly unexpected faults.

use crate::ids::{MarketSymbol, UserId};
use crate::numeric::{Amount, Quantity};
use crate::result::ResultStatus;
use thiserror::Error;

/// Errors raised by the state store and matching engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VenueError {
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("market not found: {0}")]
    MarketNotFound(MarketSymbol),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("insufficient stock: required {required}, available {available}")]
    InsufficientStock {
        required: Quantity,
        available: Quantity,
    },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl VenueError {
    /// The Result status a command fails with.
    pub fn status(&self) -> ResultStatus {
        match self {
            VenueError::UserNotFound(_) => ResultStatus::UserNotFound,
            VenueError::MarketNotFound(_) => ResultStatus::MarketNotFound,
            VenueError::InsufficientBalance { .. } => ResultStatus::InsufficientBalance,
            VenueError::InsufficientStock { .. } => ResultStatus::InsufficientStock,
            VenueError::AlreadyExists(_) => ResultStatus::AlreadyExists,
            VenueError::InvalidOrder(_) => ResultStatus::InvalidOrder,
            VenueError::Overflow(_) => ResultStatus::Internal,
        }
    }
}
