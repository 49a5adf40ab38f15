//! Order book for a binary-outcome market: one price ladder per side.

mod ladder;
mod price_level;

pub use ladder::Ladder;
pub use price_level::{LevelFill, PriceLevel};

use serde::{Deserialize, Serialize};
use types::order::Side;

/// Per-market order book, two independent ladders keyed by side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    yes: Ladder,
    no: Ladder,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn side(&self, side: Side) -> &Ladder {
        match side {
            Side::Yes => &self.yes,
            Side::No => &self.no,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Ladder {
        match side {
            Side::Yes => &mut self.yes,
            Side::No => &mut self.no,
        }
    }
}
