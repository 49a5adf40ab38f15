//! Core types for the binary-outcome trading venue
//!
//! Shared data model used by the matching engine, the worker pipeline and
//! the gateway: identifiers, integer numerics, orders, the Command/Result
//! protocol and the domain error taxonomy.

pub mod command;
pub mod errors;
pub mod ids;
pub mod numeric;
pub mod order;
pub mod result;

pub use command::{Command, CommandKind, CommandPayload};
pub use errors::VenueError;
pub use ids::{CorrelationId, MarketSymbol, OrderId, UserId};
pub use numeric::{Amount, Price, Quantity};
pub use order::{Order, OrderKind, Side};
pub use result::{CommandResult, ResultStatus};
