//! Price ladder for one side of a market
//!
//! Levels are keyed by price in a BTreeMap for deterministic iteration and
//! serialization. Both the YES and NO sides hold the same shape of resting
//! interest, so a single ladder type serves both.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::numeric::{Price, Quantity};
use types::order::Order;

use super::price_level::PriceLevel;

/// All price levels for one (market, side).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ladder {
    levels: BTreeMap<Price, PriceLevel>,
}

impl Ladder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order at its price level, creating the level if absent.
    pub fn insert(&mut self, order: Order) {
        self.levels.entry(order.price).or_default().push(order);
    }

    /// Prices of levels at or below `max`, ascending (best first for an
    /// incoming buy walking resting sells).
    pub fn eligible_ascending(&self, max: Price) -> Vec<Price> {
        self.levels.range(..=max).map(|(price, _)| *price).collect()
    }

    /// Prices of levels at or below `max`, descending. Used for the
    /// complementary walk: the highest synthetic level price corresponds to
    /// the lowest effective buy price, which is served first.
    pub fn eligible_descending(&self, max: Price) -> Vec<Price> {
        self.levels
            .range(..=max)
            .rev()
            .map(|(price, _)| *price)
            .collect()
    }

    pub fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    pub fn level(&self, price: Price) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    /// Drop the level at `price` once its total reaches zero.
    pub fn remove_if_empty(&mut self, price: Price) {
        if let Some(level) = self.levels.get(&price) {
            if level.total().is_zero() {
                self.levels.remove(&price);
            }
        }
    }

    pub fn total_at(&self, price: Price) -> Quantity {
        self.levels
            .get(&price)
            .map(|level| level.total())
            .unwrap_or(Quantity::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Levels in ascending price order.
    pub fn levels(&self) -> impl Iterator<Item = (&Price, &PriceLevel)> {
        self.levels.iter()
    }
}
