//! The Command side of the mutation-serialization protocol
//!
//! Every state mutation enters the venue as an immutable Command carrying a
//! caller-supplied correlation id. Commands are appended to the durable
//! queue and applied one at a time by the matching worker.

use crate::ids::{CorrelationId, MarketSymbol, UserId};
use crate::numeric::{Amount, Price, Quantity};
use crate::order::Side;
use serde::{Deserialize, Serialize};

/// Typed payload of a command, tagged by event kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum CommandPayload {
    CreateUser {
        user_id: UserId,
    },
    OnrampCurrency {
        user_id: UserId,
        amount: Amount,
    },
    CreateMarket {
        symbol: MarketSymbol,
    },
    Mint {
        user_id: UserId,
        symbol: MarketSymbol,
        quantity: Quantity,
        price: Price,
    },
    Sell {
        user_id: UserId,
        symbol: MarketSymbol,
        side: Side,
        quantity: Quantity,
        price: Price,
    },
    Buy {
        user_id: UserId,
        symbol: MarketSymbol,
        side: Side,
        quantity: Quantity,
        price: Price,
    },
    /// Test-only full state wipe, carried through the queue so the
    /// single-writer property is never bypassed.
    Reset,
}

impl CommandPayload {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandPayload::CreateUser { .. } => CommandKind::CreateUser,
            CommandPayload::OnrampCurrency { .. } => CommandKind::OnrampCurrency,
            CommandPayload::CreateMarket { .. } => CommandKind::CreateMarket,
            CommandPayload::Mint { .. } => CommandKind::Mint,
            CommandPayload::Sell { .. } => CommandKind::Sell,
            CommandPayload::Buy { .. } => CommandKind::Buy,
            CommandPayload::Reset => CommandKind::Reset,
        }
    }
}

/// Event kind of a command; names the notification channel a result for the
/// command is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    CreateUser,
    OnrampCurrency,
    CreateMarket,
    Mint,
    Sell,
    Buy,
    Reset,
}

impl CommandKind {
    pub fn channel(&self) -> &'static str {
        match self {
            CommandKind::CreateUser => "user.create",
            CommandKind::OnrampCurrency => "onramp",
            CommandKind::CreateMarket => "market.create",
            CommandKind::Mint => "mint",
            CommandKind::Sell => "sell",
            CommandKind::Buy => "buy",
            CommandKind::Reset => "reset",
        }
    }
}

/// An immutable request to mutate market state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub correlation_id: CorrelationId,
    #[serde(flatten)]
    pub payload: CommandPayload,
}

impl Command {
    pub fn new(correlation_id: CorrelationId, payload: CommandPayload) -> Self {
        Self {
            correlation_id,
            payload,
        }
    }

    /// Notification channel a result for this command is published on.
    pub fn channel(&self) -> &'static str {
        self.payload.kind().channel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format_is_event_tagged() {
        let cmd = Command::new(
            CorrelationId::new("c-1"),
            CommandPayload::OnrampCurrency {
                user_id: UserId::new("alice"),
                amount: Amount::new(50_000),
            },
        );
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["event"], "OnrampCurrency");
        assert_eq!(json["correlation_id"], "c-1");
        assert_eq!(json["amount"], 50_000);
    }

    #[test]
    fn test_command_roundtrip() {
        let cmd = Command::new(
            CorrelationId::generate(),
            CommandPayload::Buy {
                user_id: UserId::new("bob"),
                symbol: MarketSymbol::new("RAIN_TOMORROW"),
                side: Side::No,
                quantity: Quantity::new(10),
                price: Price::new(1000),
            },
        );
        let json = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, back);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(CommandKind::CreateUser.channel(), "user.create");
        assert_eq!(CommandKind::Sell.channel(), "sell");
        assert_eq!(CommandKind::Reset.channel(), "reset");
    }
}
