//! Request bodies. Field names follow the external API's camelCase wire
//! convention.

use serde::Deserialize;
use types::ids::{MarketSymbol, UserId};
use types::numeric::{Amount, Price, Quantity};
use types::order::Side;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnrampRequest {
    pub user_id: UserId,
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub user_id: UserId,
    pub stock_symbol: MarketSymbol,
    pub quantity: Quantity,
    pub price: Price,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: UserId,
    pub stock_symbol: MarketSymbol,
    /// Which outcome token the order trades ("yes" or "no").
    pub stock_type: Side,
    pub quantity: Quantity,
    pub price: Price,
}
