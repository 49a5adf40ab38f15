//! Matching Engine Service
//!
//! Order matching for binary-outcome markets with price-time priority and
//! complementary-order cross-matching between the YES and NO ladders.
//!
//! **Key Invariants:**
//! - Price priority before time priority, strict FIFO within a level
//! - Every level's total equals the sum of its orders' remaining quantity
//! - Balances and positions never go negative
//! - Trades transfer currency and tokens, never create or destroy them

pub mod book;
pub mod engine;
pub mod store;

pub use engine::{Engine, EngineConfig, MatchStatus, TradeOutcome};
pub use store::MarketStore;
