//! Authoritative market state and balance/position accounting
//!
//! The store is owned exclusively by the matching worker; everything else
//! reaches it through the Command/Result protocol. Every mutator validates
//! its precondition and performs no partial change on failure. Nested
//! records are never auto-vivified on read: creation happens only through
//! the explicit get-or-create accessor `portfolio_mut`.
//!
//! All maps are `BTreeMap` so the persisted snapshot document serializes
//! deterministically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::errors::VenueError;
use types::ids::{MarketSymbol, UserId};
use types::numeric::{Amount, Price, Quantity};
use types::order::Side;

use crate::book::OrderBook;

/// Currency account: free balance plus currency reserved against open buys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub balance: Amount,
    pub locked: Amount,
}

/// One side of a user's position in one market: free tokens plus tokens
/// reserved against open sells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidePosition {
    pub quantity: Quantity,
    pub locked: Quantity,
}

/// Per-user, per-market position on both sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub yes: SidePosition,
    pub no: SidePosition,
}

impl Portfolio {
    pub fn side(&self, side: Side) -> &SidePosition {
        match side {
            Side::Yes => &self.yes,
            Side::No => &self.no,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SidePosition {
        match side {
            Side::Yes => &mut self.yes,
            Side::No => &mut self.no,
        }
    }
}

/// Market registration with minted-supply counters, incremented only by
/// minting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub minted_yes: Quantity,
    pub minted_no: Quantity,
}

/// In-memory market state with the snapshot document's key layout:
/// `users`, `stockBalances` (portfolios) and `orders` (books), plus the
/// market registry with minted-supply counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketStore {
    users: BTreeMap<UserId, UserAccount>,
    #[serde(rename = "stockBalances")]
    portfolios: BTreeMap<UserId, BTreeMap<MarketSymbol, Portfolio>>,
    markets: BTreeMap<MarketSymbol, Market>,
    #[serde(rename = "orders")]
    books: BTreeMap<MarketSymbol, OrderBook>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Users & currency ────────────────────────────────────────────

    pub fn create_user(&mut self, user_id: UserId) -> Result<(), VenueError> {
        if self.users.contains_key(&user_id) {
            return Err(VenueError::AlreadyExists(user_id.to_string()));
        }
        self.portfolios.insert(user_id.clone(), BTreeMap::new());
        self.users.insert(user_id, UserAccount::default());
        Ok(())
    }

    pub fn user(&self, user_id: &UserId) -> Result<&UserAccount, VenueError> {
        self.users
            .get(user_id)
            .ok_or_else(|| VenueError::UserNotFound(user_id.clone()))
    }

    fn user_mut(&mut self, user_id: &UserId) -> Result<&mut UserAccount, VenueError> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| VenueError::UserNotFound(user_id.clone()))
    }

    pub fn credit_balance(&mut self, user_id: &UserId, amount: Amount) -> Result<(), VenueError> {
        let account = self.user_mut(user_id)?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(VenueError::Overflow("balance credit"))?;
        Ok(())
    }

    pub fn debit_balance(&mut self, user_id: &UserId, amount: Amount) -> Result<(), VenueError> {
        let account = self.user_mut(user_id)?;
        account.balance =
            account
                .balance
                .checked_sub(amount)
                .ok_or(VenueError::InsufficientBalance {
                    required: amount,
                    available: account.balance,
                })?;
        Ok(())
    }

    /// Move currency from free balance into the locked reserve.
    pub fn lock_balance(&mut self, user_id: &UserId, amount: Amount) -> Result<(), VenueError> {
        let account = self.user_mut(user_id)?;
        let balance =
            account
                .balance
                .checked_sub(amount)
                .ok_or(VenueError::InsufficientBalance {
                    required: amount,
                    available: account.balance,
                })?;
        let locked = account
            .locked
            .checked_add(amount)
            .ok_or(VenueError::Overflow("balance lock"))?;
        account.balance = balance;
        account.locked = locked;
        Ok(())
    }

    /// Move currency from the locked reserve back to free balance.
    pub fn unlock_balance(&mut self, user_id: &UserId, amount: Amount) -> Result<(), VenueError> {
        let account = self.user_mut(user_id)?;
        let locked = account
            .locked
            .checked_sub(amount)
            .ok_or(VenueError::Overflow("balance unlock"))?;
        let balance = account
            .balance
            .checked_add(amount)
            .ok_or(VenueError::Overflow("balance unlock"))?;
        account.locked = locked;
        account.balance = balance;
        Ok(())
    }

    /// Settle a fill: release `amount` from `from`'s locked reserve and
    /// credit it to `to`'s free balance. `from` and `to` may coincide.
    pub fn settle_locked(
        &mut self,
        from: &UserId,
        to: &UserId,
        amount: Amount,
    ) -> Result<(), VenueError> {
        {
            let payer = self.user_mut(from)?;
            payer.locked = payer
                .locked
                .checked_sub(amount)
                .ok_or(VenueError::Overflow("locked settle"))?;
        }
        let payee = self.user_mut(to)?;
        payee.balance = payee
            .balance
            .checked_add(amount)
            .ok_or(VenueError::Overflow("locked settle"))?;
        Ok(())
    }

    // ── Markets ─────────────────────────────────────────────────────

    pub fn create_market(&mut self, symbol: MarketSymbol) -> Result<(), VenueError> {
        if self.markets.contains_key(&symbol) {
            return Err(VenueError::AlreadyExists(symbol.to_string()));
        }
        self.books.insert(symbol.clone(), OrderBook::new());
        self.markets.insert(symbol, Market::default());
        Ok(())
    }

    pub fn market(&self, symbol: &MarketSymbol) -> Result<&Market, VenueError> {
        self.markets
            .get(symbol)
            .ok_or_else(|| VenueError::MarketNotFound(symbol.clone()))
    }

    pub fn book(&self, symbol: &MarketSymbol) -> Result<&OrderBook, VenueError> {
        self.books
            .get(symbol)
            .ok_or_else(|| VenueError::MarketNotFound(symbol.clone()))
    }

    pub fn book_mut(&mut self, symbol: &MarketSymbol) -> Result<&mut OrderBook, VenueError> {
        self.books
            .get_mut(symbol)
            .ok_or_else(|| VenueError::MarketNotFound(symbol.clone()))
    }

    /// Convert currency into paired YES/NO tokens: debits `2 * qty * price`
    /// and credits `qty` free tokens on both sides, bumping minted supply.
    pub fn mint(
        &mut self,
        user_id: &UserId,
        symbol: &MarketSymbol,
        quantity: Quantity,
        price: Price,
    ) -> Result<(), VenueError> {
        self.market(symbol)?;
        let per_side = price
            .cost(quantity)
            .ok_or(VenueError::Overflow("mint cost"))?;
        let cost = per_side
            .checked_add(per_side)
            .ok_or(VenueError::Overflow("mint cost"))?;

        // Check before any mutation so a failed mint has no effect.
        let available = self.user(user_id)?.balance;
        if available < cost {
            return Err(VenueError::InsufficientBalance {
                required: cost,
                available,
            });
        }

        self.debit_balance(user_id, cost)?;
        let portfolio = self.portfolio_mut(user_id, symbol)?;
        portfolio.yes.quantity = portfolio
            .yes
            .quantity
            .checked_add(quantity)
            .ok_or(VenueError::Overflow("mint yes"))?;
        portfolio.no.quantity = portfolio
            .no
            .quantity
            .checked_add(quantity)
            .ok_or(VenueError::Overflow("mint no"))?;

        let market = self
            .markets
            .get_mut(symbol)
            .ok_or_else(|| VenueError::MarketNotFound(symbol.clone()))?;
        market.minted_yes = market
            .minted_yes
            .checked_add(quantity)
            .ok_or(VenueError::Overflow("minted supply"))?;
        market.minted_no = market
            .minted_no
            .checked_add(quantity)
            .ok_or(VenueError::Overflow("minted supply"))?;
        Ok(())
    }

    // ── Portfolios & tokens ─────────────────────────────────────────

    pub fn portfolio(&self, user_id: &UserId, symbol: &MarketSymbol) -> Option<&Portfolio> {
        self.portfolios.get(user_id)?.get(symbol)
    }

    /// Get-or-create accessor: default-constructs the per-market record on
    /// first access. The user must exist.
    pub fn portfolio_mut(
        &mut self,
        user_id: &UserId,
        symbol: &MarketSymbol,
    ) -> Result<&mut Portfolio, VenueError> {
        let by_market = self
            .portfolios
            .get_mut(user_id)
            .ok_or_else(|| VenueError::UserNotFound(user_id.clone()))?;
        Ok(by_market.entry(symbol.clone()).or_default())
    }

    /// Free token quantity a user holds on one side of a market.
    pub fn free_stock(&self, user_id: &UserId, symbol: &MarketSymbol, side: Side) -> Quantity {
        self.portfolio(user_id, symbol)
            .map(|p| p.side(side).quantity)
            .unwrap_or(Quantity::ZERO)
    }

    pub fn credit_stock(
        &mut self,
        user_id: &UserId,
        symbol: &MarketSymbol,
        side: Side,
        quantity: Quantity,
    ) -> Result<(), VenueError> {
        let position = self.portfolio_mut(user_id, symbol)?.side_mut(side);
        position.quantity = position
            .quantity
            .checked_add(quantity)
            .ok_or(VenueError::Overflow("stock credit"))?;
        Ok(())
    }

    pub fn debit_stock(
        &mut self,
        user_id: &UserId,
        symbol: &MarketSymbol,
        side: Side,
        quantity: Quantity,
    ) -> Result<(), VenueError> {
        let position = self.portfolio_mut(user_id, symbol)?.side_mut(side);
        position.quantity =
            position
                .quantity
                .checked_sub(quantity)
                .ok_or(VenueError::InsufficientStock {
                    required: quantity,
                    available: position.quantity,
                })?;
        Ok(())
    }

    /// Move tokens from the free pool into the locked reserve.
    pub fn lock_stock(
        &mut self,
        user_id: &UserId,
        symbol: &MarketSymbol,
        side: Side,
        quantity: Quantity,
    ) -> Result<(), VenueError> {
        let position = self.portfolio_mut(user_id, symbol)?.side_mut(side);
        let free =
            position
                .quantity
                .checked_sub(quantity)
                .ok_or(VenueError::InsufficientStock {
                    required: quantity,
                    available: position.quantity,
                })?;
        let locked = position
            .locked
            .checked_add(quantity)
            .ok_or(VenueError::Overflow("stock lock"))?;
        position.quantity = free;
        position.locked = locked;
        Ok(())
    }

    /// Consume tokens from the locked reserve (a resting sell was filled).
    pub fn settle_locked_stock(
        &mut self,
        user_id: &UserId,
        symbol: &MarketSymbol,
        side: Side,
        quantity: Quantity,
    ) -> Result<(), VenueError> {
        let position = self.portfolio_mut(user_id, symbol)?.side_mut(side);
        position.locked = position
            .locked
            .checked_sub(quantity)
            .ok_or(VenueError::Overflow("stock settle"))?;
        Ok(())
    }

    // ── Views & maintenance ─────────────────────────────────────────

    pub fn users(&self) -> &BTreeMap<UserId, UserAccount> {
        &self.users
    }

    pub fn portfolios(&self) -> &BTreeMap<UserId, BTreeMap<MarketSymbol, Portfolio>> {
        &self.portfolios
    }

    pub fn markets(&self) -> &BTreeMap<MarketSymbol, Market> {
        &self.markets
    }

    pub fn books(&self) -> &BTreeMap<MarketSymbol, OrderBook> {
        &self.books
    }

    /// Test-only full wipe.
    pub fn reset(&mut self) {
        self.users.clear();
        self.portfolios.clear();
        self.markets.clear();
        self.books.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_user(id: &str) -> MarketStore {
        let mut store = MarketStore::new();
        store.create_user(UserId::new(id)).unwrap();
        store
    }

    #[test]
    fn test_create_user_twice_rejected() {
        let mut store = store_with_user("alice");
        assert_eq!(
            store.create_user(UserId::new("alice")),
            Err(VenueError::AlreadyExists("alice".into()))
        );
    }

    #[test]
    fn test_debit_fails_fast_without_partial_change() {
        let mut store = store_with_user("alice");
        store
            .credit_balance(&UserId::new("alice"), Amount::new(100))
            .unwrap();

        let result = store.debit_balance(&UserId::new("alice"), Amount::new(101));
        assert!(matches!(
            result,
            Err(VenueError::InsufficientBalance { .. })
        ));
        assert_eq!(
            store.user(&UserId::new("alice")).unwrap().balance,
            Amount::new(100)
        );
    }

    #[test]
    fn test_lock_and_settle_balance() {
        let mut store = store_with_user("buyer");
        store.create_user(UserId::new("seller")).unwrap();
        let buyer = UserId::new("buyer");
        let seller = UserId::new("seller");

        store.credit_balance(&buyer, Amount::new(5_000)).unwrap();
        store.lock_balance(&buyer, Amount::new(3_000)).unwrap();
        assert_eq!(store.user(&buyer).unwrap().balance, Amount::new(2_000));
        assert_eq!(store.user(&buyer).unwrap().locked, Amount::new(3_000));

        store
            .settle_locked(&buyer, &seller, Amount::new(3_000))
            .unwrap();
        assert_eq!(store.user(&buyer).unwrap().locked, Amount::ZERO);
        assert_eq!(store.user(&seller).unwrap().balance, Amount::new(3_000));
    }

    #[test]
    fn test_unlock_returns_reserve_to_balance() {
        let mut store = store_with_user("alice");
        let alice = UserId::new("alice");
        store.credit_balance(&alice, Amount::new(1_000)).unwrap();
        store.lock_balance(&alice, Amount::new(700)).unwrap();

        store.unlock_balance(&alice, Amount::new(700)).unwrap();
        assert_eq!(store.user(&alice).unwrap().balance, Amount::new(1_000));
        assert_eq!(store.user(&alice).unwrap().locked, Amount::ZERO);

        let result = store.unlock_balance(&alice, Amount::new(1));
        assert!(matches!(result, Err(VenueError::Overflow(_))));
    }

    #[test]
    fn test_mint_debits_twice_quantity_times_price() {
        let mut store = store_with_user("alice");
        let alice = UserId::new("alice");
        let symbol = MarketSymbol::new("M");
        store.create_market(symbol.clone()).unwrap();
        store.credit_balance(&alice, Amount::new(50_000)).unwrap();

        store
            .mint(&alice, &symbol, Quantity::new(25), Price::new(1000))
            .unwrap();

        assert_eq!(store.user(&alice).unwrap().balance, Amount::ZERO);
        let portfolio = store.portfolio(&alice, &symbol).unwrap();
        assert_eq!(portfolio.yes.quantity, Quantity::new(25));
        assert_eq!(portfolio.no.quantity, Quantity::new(25));
        let market = store.market(&symbol).unwrap();
        assert_eq!(market.minted_yes, Quantity::new(25));
        assert_eq!(market.minted_no, Quantity::new(25));
    }

    #[test]
    fn test_mint_insufficient_balance_is_a_no_op() {
        let mut store = store_with_user("alice");
        let alice = UserId::new("alice");
        let symbol = MarketSymbol::new("M");
        store.create_market(symbol.clone()).unwrap();
        store.credit_balance(&alice, Amount::new(100)).unwrap();

        let result = store.mint(&alice, &symbol, Quantity::new(1), Price::new(1000));
        assert!(matches!(
            result,
            Err(VenueError::InsufficientBalance { .. })
        ));
        assert_eq!(store.user(&alice).unwrap().balance, Amount::new(100));
        assert!(store.portfolio(&alice, &symbol).is_none());
    }

    #[test]
    fn test_portfolio_created_explicitly_not_on_read() {
        let mut store = store_with_user("alice");
        let alice = UserId::new("alice");
        let symbol = MarketSymbol::new("M");

        assert!(store.portfolio(&alice, &symbol).is_none());
        assert_eq!(store.free_stock(&alice, &symbol, Side::Yes), Quantity::ZERO);

        store.portfolio_mut(&alice, &symbol).unwrap();
        assert!(store.portfolio(&alice, &symbol).is_some());
    }

    #[test]
    fn test_stock_lock_and_settle() {
        let mut store = store_with_user("alice");
        let alice = UserId::new("alice");
        let symbol = MarketSymbol::new("M");
        store.create_market(symbol.clone()).unwrap();
        store.credit_balance(&alice, Amount::new(20_000)).unwrap();
        store
            .mint(&alice, &symbol, Quantity::new(10), Price::new(1000))
            .unwrap();

        store
            .lock_stock(&alice, &symbol, Side::No, Quantity::new(4))
            .unwrap();
        let position = store.portfolio(&alice, &symbol).unwrap().side(Side::No);
        assert_eq!(position.quantity, Quantity::new(6));
        assert_eq!(position.locked, Quantity::new(4));

        store
            .settle_locked_stock(&alice, &symbol, Side::No, Quantity::new(4))
            .unwrap();
        let position = store.portfolio(&alice, &symbol).unwrap().side(Side::No);
        assert_eq!(position.locked, Quantity::ZERO);
    }

    #[test]
    fn test_market_not_found() {
        let store = MarketStore::new();
        assert!(matches!(
            store.market(&MarketSymbol::new("ghost")),
            Err(VenueError::MarketNotFound(_))
        ));
    }
}
