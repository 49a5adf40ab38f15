//! Price level implementation with FIFO queue
//!
//! A price level contains all orders resting at a specific price point on
//! one side of one market. Orders are maintained in FIFO order to enforce
//! time priority at equal price.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use types::ids::{OrderId, UserId};
use types::numeric::Quantity;
use types::order::{Order, OrderKind};

/// A price level containing orders at a specific price
///
/// Maintains strict FIFO ordering for time-priority matching and an
/// aggregate `total` equal to the sum of resident remaining quantities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Queue of orders at this price level (FIFO order)
    orders: VecDeque<Order>,
    /// Total outstanding quantity at this level
    total: Quantity,
}

/// One fill taken from the front-most eligible order of a level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelFill {
    pub order_id: OrderId,
    pub owner: UserId,
    pub quantity: Quantity,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an order at the back of the queue (time priority).
    pub fn push(&mut self, order: Order) {
        self.total = self
            .total
            .checked_add(order.remaining())
            .expect("level total overflow");
        self.orders.push_back(order);
    }

    /// Fill the earliest resident order of the given kind, up to `want`.
    ///
    /// Applies the fill to the order and the level total; a fully consumed
    /// order is removed. Returns None when no order of that kind with
    /// remaining quantity is resident.
    pub fn fill_first(&mut self, kind: OrderKind, want: Quantity) -> Option<LevelFill> {
        if want.is_zero() {
            return None;
        }
        let position = self
            .orders
            .iter()
            .position(|order| order.kind == kind && !order.remaining().is_zero())?;

        let order = &mut self.orders[position];
        let fill_qty = want.min(order.remaining());
        order.add_fill(fill_qty);

        let fill = LevelFill {
            order_id: order.order_id,
            owner: order.owner.clone(),
            quantity: fill_qty,
        };

        if order.is_filled() {
            self.orders.remove(position);
        }
        self.total = self
            .total
            .checked_sub(fill_qty)
            .expect("level total underflow");

        Some(fill)
    }

    /// Whether any order of the given kind has remaining quantity here.
    pub fn has_kind(&self, kind: OrderKind) -> bool {
        self.orders
            .iter()
            .any(|order| order.kind == kind && !order.remaining().is_zero())
    }

    pub fn total(&self) -> Quantity {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Resident orders in FIFO order.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// Check the level invariant: total equals the sum of remaining
    /// quantities over resident orders.
    pub fn check_invariant(&self) -> bool {
        let sum = self
            .orders
            .iter()
            .try_fold(Quantity::ZERO, |acc, o| acc.checked_add(o.remaining()));
        sum == Some(self.total)
    }
}
