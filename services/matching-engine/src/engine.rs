//! Matching engine for binary-outcome markets
//!
//! Two execution paths share one book:
//!
//! - A **sell** on side S walks the *opposite* ladder's Synthetic entries.
//!   A synthetic resting at level price `ps` is an unmatched buy of S at
//!   `k - ps`, with the buyer's currency already locked. Levels are walked
//!   in descending `ps`, so the lowest effective buy price is consumed
//!   first. Each fill transfers the seller's free tokens to the buyer and
//!   releases `k - ps` per token from the buyer's locked currency to the
//!   seller. Any remainder locks tokens and rests as a Direct order at the
//!   ask price on the seller's own ladder.
//!
//! - A **buy** on side S walks its *own* ladder's Direct entries in
//!   ascending price up to the bid. Each fill pays the maker's ask from the
//!   taker's free balance and moves tokens out of the maker's locked pool.
//!   Any remainder locks `remainder * price` currency and rests as a
//!   Synthetic order at the complementary price on the opposite ladder.
//!
//! All validation happens before the first mutation, and every mutation
//! goes through the store's checked fail-fast operations, so a rejected
//! command leaves the store untouched.

use std::collections::BTreeMap;
use types::errors::VenueError;
use types::ids::{MarketSymbol, UserId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderKind, Side};

use crate::store::MarketStore;

/// Engine parameters.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Combined payout of one YES plus one NO token. Prices are valid in
    /// `1..=payout_sum` and complementary prices are taken against it.
    pub payout_sum: Price,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payout_sum: Price::new(1000),
        }
    }
}

/// How much of an incoming order executed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// Fully executed, nothing rests.
    Complete,
    /// Partially executed, remainder rests on the book.
    Partial,
    /// No execution, full quantity rests on the book.
    Resting,
}

/// Result of submitting an order: execution status, unexecuted remainder
/// and per-counterparty filled quantities.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub status: MatchStatus,
    pub remaining: Quantity,
    pub fills: BTreeMap<UserId, Quantity>,
}

impl TradeOutcome {
    fn from_match(quantity: Quantity, remaining: Quantity, fills: BTreeMap<UserId, Quantity>) -> Self {
        let status = if remaining.is_zero() {
            MatchStatus::Complete
        } else if remaining == quantity {
            MatchStatus::Resting
        } else {
            MatchStatus::Partial
        };
        Self {
            status,
            remaining,
            fills,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn payout_sum(&self) -> Price {
        self.config.payout_sum
    }

    fn validate(
        &self,
        store: &MarketStore,
        user: &UserId,
        symbol: &MarketSymbol,
        price: Price,
        quantity: Quantity,
    ) -> Result<(), VenueError> {
        if quantity.is_zero() {
            return Err(VenueError::InvalidOrder("quantity must be at least 1".into()));
        }
        if price.is_zero() || price > self.config.payout_sum {
            return Err(VenueError::InvalidOrder(format!(
                "price {price} outside 1..={}",
                self.config.payout_sum
            )));
        }
        store.user(user)?;
        store.market(symbol)?;
        Ok(())
    }

    /// Submit a limit sell of `quantity` tokens on `side` at `price`.
    pub fn submit_sell(
        &self,
        store: &mut MarketStore,
        user: &UserId,
        symbol: &MarketSymbol,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Result<TradeOutcome, VenueError> {
        self.validate(store, user, symbol, price, quantity)?;
        let available = store.free_stock(user, symbol, side);
        if available < quantity {
            return Err(VenueError::InsufficientStock {
                required: quantity,
                available,
            });
        }

        // Synthetic entries resting at ps represent buys at k - ps; the
        // sell crosses those with k - ps >= price, i.e. ps <= k - price.
        let cap = price
            .complement(self.config.payout_sum)
            .ok_or(VenueError::Overflow("price complement"))?;
        let opposite = side.opposite();
        let levels = store.book(symbol)?.side(opposite).eligible_descending(cap);

        let mut remaining = quantity;
        let mut fills: BTreeMap<UserId, Quantity> = BTreeMap::new();
        for level_price in levels {
            while !remaining.is_zero() {
                let fill = match store
                    .book_mut(symbol)?
                    .side_mut(opposite)
                    .level_mut(level_price)
                    .and_then(|level| level.fill_first(OrderKind::Synthetic, remaining))
                {
                    Some(fill) => fill,
                    None => break,
                };

                store.debit_stock(user, symbol, side, fill.quantity)?;
                store.credit_stock(&fill.owner, symbol, side, fill.quantity)?;

                let buy_price = level_price
                    .complement(self.config.payout_sum)
                    .ok_or(VenueError::Overflow("price complement"))?;
                let proceeds = buy_price
                    .cost(fill.quantity)
                    .ok_or(VenueError::Overflow("trade proceeds"))?;
                store.settle_locked(&fill.owner, user, proceeds)?;

                remaining = remaining
                    .checked_sub(fill.quantity)
                    .ok_or(VenueError::Overflow("fill accounting"))?;
                record_fill(&mut fills, &fill.owner, fill.quantity)?;
            }
            store
                .book_mut(symbol)?
                .side_mut(opposite)
                .remove_if_empty(level_price);
            if remaining.is_zero() {
                break;
            }
        }

        if !remaining.is_zero() {
            store.lock_stock(user, symbol, side, remaining)?;
            let order = Order::new(user.clone(), side, price, remaining, OrderKind::Direct);
            store.book_mut(symbol)?.side_mut(side).insert(order);
        }

        Ok(TradeOutcome::from_match(quantity, remaining, fills))
    }

    /// Submit a limit buy of `quantity` tokens on `side` at `price`.
    pub fn submit_buy(
        &self,
        store: &mut MarketStore,
        user: &UserId,
        symbol: &MarketSymbol,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Result<TradeOutcome, VenueError> {
        self.validate(store, user, symbol, price, quantity)?;
        let cost = price
            .cost(quantity)
            .ok_or(VenueError::Overflow("order cost"))?;
        let available = store.user(user)?.balance;
        if available < cost {
            return Err(VenueError::InsufficientBalance {
                required: cost,
                available,
            });
        }

        let levels = store.book(symbol)?.side(side).eligible_ascending(price);

        let mut remaining = quantity;
        let mut fills: BTreeMap<UserId, Quantity> = BTreeMap::new();
        for level_price in levels {
            while !remaining.is_zero() {
                let fill = match store
                    .book_mut(symbol)?
                    .side_mut(side)
                    .level_mut(level_price)
                    .and_then(|level| level.fill_first(OrderKind::Direct, remaining))
                {
                    Some(fill) => fill,
                    None => break,
                };

                let paid = level_price
                    .cost(fill.quantity)
                    .ok_or(VenueError::Overflow("trade cost"))?;
                store.debit_balance(user, paid)?;
                store.credit_balance(&fill.owner, paid)?;

                store.settle_locked_stock(&fill.owner, symbol, side, fill.quantity)?;
                store.credit_stock(user, symbol, side, fill.quantity)?;

                remaining = remaining
                    .checked_sub(fill.quantity)
                    .ok_or(VenueError::Overflow("fill accounting"))?;
                record_fill(&mut fills, &fill.owner, fill.quantity)?;
            }
            store
                .book_mut(symbol)?
                .side_mut(side)
                .remove_if_empty(level_price);
            if remaining.is_zero() {
                break;
            }
        }

        if !remaining.is_zero() {
            let reserve = price
                .cost(remaining)
                .ok_or(VenueError::Overflow("order reserve"))?;
            store.lock_balance(user, reserve)?;
            let rest_price = price
                .complement(self.config.payout_sum)
                .ok_or(VenueError::Overflow("price complement"))?;
            let order = Order::new(
                user.clone(),
                side.opposite(),
                rest_price,
                remaining,
                OrderKind::Synthetic,
            );
            store.book_mut(symbol)?.side_mut(side.opposite()).insert(order);
        }

        Ok(TradeOutcome::from_match(quantity, remaining, fills))
    }
}

fn record_fill(
    fills: &mut BTreeMap<UserId, Quantity>,
    owner: &UserId,
    quantity: Quantity,
) -> Result<(), VenueError> {
    let entry = fills.entry(owner.clone()).or_insert(Quantity::ZERO);
    *entry = entry
        .checked_add(quantity)
        .ok_or(VenueError::Overflow("fill accounting"))?;
    Ok(())
}
