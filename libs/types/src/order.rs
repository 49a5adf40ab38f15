//! Order and side types
//!
//! A Direct order was placed explicitly by its owner. A Synthetic order is
//! created by the engine on the opposite side's ladder to represent the
//! unmatched complementary exposure of a buy order.

use crate::ids::{OrderId, UserId};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Outcome side of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

/// How a resting order came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Placed explicitly by its owner (a resting sell).
    Direct,
    /// Auto-created complementary exposure of an unmatched buy.
    Synthetic,
}

/// A resting order on one side of one market's book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub owner: UserId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub filled: Quantity,
    pub kind: OrderKind,
}

impl Order {
    pub fn new(owner: UserId, side: Side, price: Price, quantity: Quantity, kind: OrderKind) -> Self {
        Self {
            order_id: OrderId::new(),
            owner,
            side,
            price,
            quantity,
            filled: Quantity::ZERO,
            kind,
        }
    }

    /// Unfilled quantity still resting on the book.
    pub fn remaining(&self) -> Quantity {
        self.quantity
            .checked_sub(self.filled)
            .unwrap_or(Quantity::ZERO)
    }

    pub fn is_filled(&self) -> bool {
        self.filled == self.quantity
    }

    /// Record a fill against this order.
    ///
    /// # Panics
    /// Panics if the fill would exceed the order quantity; callers bound the
    /// fill by `remaining()` before settling any state.
    pub fn add_fill(&mut self, fill: Quantity) {
        let new_filled = self
            .filled
            .checked_add(fill)
            .expect("fill arithmetic overflow");
        assert!(
            new_filled <= self.quantity,
            "fill would exceed order quantity"
        );
        self.filled = new_filled;
    }
}
