//! Single-writer command pipeline
//!
//! All state mutations flow through one path: the gateway journals a
//! Command onto the [`queue::CommandQueue`], the [`worker::MatchingWorker`]
//! applies commands one at a time against the authoritative
//! [`matching_engine::MarketStore`], snapshots the result, and publishes a
//! CommandResult on the [`bus::NotificationBus`] keyed by correlation id.
//! Exactly one waiter can observe each result, so concurrent callers never
//! receive each other's outcomes.

pub mod bus;
pub mod queue;
pub mod worker;

pub use bus::NotificationBus;
pub use queue::{CommandQueue, QueueError};
pub use worker::{MatchingWorker, WorkerError};
