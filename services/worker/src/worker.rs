//! The matching worker: sole writer of market state
//!
//! Commands arrive one at a time from the queue. Each is applied to a
//! clone of the current state; only when the resulting state has been
//! snapshotted durably does the worker adopt it, refresh the shared read
//! view, ack the journal and publish the result. A snapshot failure
//! discards the clone, leaves the command unacked for redelivery and
//! publishes an internal-error result.
//!
//! Redeliveries are absorbed by an idempotency window of recently applied
//! correlation ids persisted inside the snapshot itself: a duplicate is
//! acked and its recorded result republished without touching state.

use matching_engine::{Engine, MarketStore, MatchStatus};
use persistence::snapshot::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};
use types::command::{Command, CommandPayload};
use types::errors::VenueError;
use types::ids::CorrelationId;
use types::result::{CommandResult, ResultStatus};

use crate::bus::NotificationBus;
use crate::queue::CommandQueue;

/// How many applied results the idempotency window retains.
const APPLIED_WINDOW: usize = 4096;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] persistence::snapshot::StoreError),
}

/// Recently applied results, evicted oldest-first. Persisted with the
/// market state so the window survives restarts along with the effects it
/// guards against repeating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AppliedWindow {
    results: BTreeMap<CorrelationId, CommandResult>,
    order: VecDeque<CorrelationId>,
}

impl AppliedWindow {
    fn get(&self, id: &CorrelationId) -> Option<&CommandResult> {
        self.results.get(id)
    }

    fn insert(&mut self, result: CommandResult) {
        let id = result.correlation_id.clone();
        if self.results.insert(id.clone(), result).is_none() {
            self.order.push_back(id);
        }
        while self.order.len() > APPLIED_WINDOW {
            if let Some(evicted) = self.order.pop_front() {
                self.results.remove(&evicted);
            }
        }
    }

    fn len(&self) -> usize {
        self.results.len()
    }
}

/// Everything the worker persists: the authoritative market state plus the
/// idempotency window, snapshotted as a single document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WorkerState {
    market: MarketStore,
    applied: AppliedWindow,
}

pub struct MatchingWorker {
    engine: Engine,
    state: WorkerState,
    snapshots: DocumentStore<WorkerState>,
    queue: Arc<CommandQueue>,
    bus: Arc<NotificationBus>,
    view: Arc<RwLock<MarketStore>>,
}

impl MatchingWorker {
    /// Open the worker against `data_dir`, recovering the newest snapshot
    /// if one exists.
    pub fn open(
        data_dir: &Path,
        engine: Engine,
        queue: Arc<CommandQueue>,
        bus: Arc<NotificationBus>,
    ) -> Result<Self, WorkerError> {
        let snapshots = DocumentStore::new(data_dir.join("snapshots"), true, 4);
        let state = match snapshots.load_latest()? {
            Some((sequence, state)) => {
                info!(sequence, "recovered state snapshot");
                state
            }
            None => {
                info!("starting with empty state");
                WorkerState::default()
            }
        };
        let view = Arc::new(RwLock::new(state.market.clone()));
        Ok(Self {
            engine,
            state,
            snapshots,
            queue,
            bus,
            view,
        })
    }

    /// Shared read-only view of the market state, refreshed after every
    /// applied command.
    pub fn view(&self) -> Arc<RwLock<MarketStore>> {
        Arc::clone(&self.view)
    }

    /// Consume commands until the queue side shuts down.
    pub async fn run(mut self, mut rx: mpsc::Receiver<(u64, Command)>) {
        while let Some((seq, command)) = rx.recv().await {
            self.handle(seq, command).await;
        }
        info!("command queue closed, worker stopping");
    }

    async fn handle(&mut self, seq: u64, command: Command) {
        let channel = command.channel();

        // Redelivered duplicate: replay the recorded result.
        if let Some(previous) = self.state.applied.get(&command.correlation_id) {
            warn!(seq, correlation_id = %command.correlation_id, "duplicate command, replaying result");
            let result = previous.clone();
            if let Err(e) = self.queue.ack(seq).await {
                error!(seq, error = %e, "failed to ack duplicate");
            }
            self.bus.publish(channel, result);
            return;
        }

        let mut next = self.state.clone();
        let result = apply(&self.engine, &mut next.market, &command);
        next.applied.insert(result.clone());

        match self.snapshots.write(seq, &next) {
            Ok(_) => {
                self.state = next;
                *self.view.write().await = self.state.market.clone();
                if let Err(e) = self.queue.ack(seq).await {
                    error!(seq, error = %e, "failed to ack applied command");
                }
                self.bus.publish(channel, result);
            }
            Err(e) => {
                // State clone discarded; the command stays unacked and will
                // be redelivered.
                error!(seq, error = %e, "snapshot write failed, discarding state change");
                self.bus.publish(
                    channel,
                    CommandResult::status(command.correlation_id, ResultStatus::Internal),
                );
            }
        }
    }

    #[cfg(test)]
    fn applied_len(&self) -> usize {
        self.state.applied.len()
    }
}

/// Apply one command to the store. Domain rejections come back as result
/// statuses; the store is untouched when a command is rejected.
fn apply(engine: &Engine, market: &mut MarketStore, command: &Command) -> CommandResult {
    let id = command.correlation_id.clone();
    let outcome = match &command.payload {
        CommandPayload::CreateUser { user_id } => market
            .create_user(user_id.clone())
            .map(|_| CommandResult::status(id.clone(), ResultStatus::Success)),
        CommandPayload::OnrampCurrency { user_id, amount } => market
            .credit_balance(user_id, *amount)
            .map(|_| CommandResult::status(id.clone(), ResultStatus::Success)),
        CommandPayload::CreateMarket { symbol } => market
            .create_market(symbol.clone())
            .map(|_| CommandResult::status(id.clone(), ResultStatus::Success)),
        CommandPayload::Mint {
            user_id,
            symbol,
            quantity,
            price,
        } => market
            .mint(user_id, symbol, *quantity, *price)
            .map(|_| CommandResult::status(id.clone(), ResultStatus::Success)),
        CommandPayload::Sell {
            user_id,
            symbol,
            side,
            quantity,
            price,
        } => engine
            .submit_sell(market, user_id, symbol, *side, *price, *quantity)
            .map(|outcome| {
                let status = match outcome.status {
                    MatchStatus::Complete => ResultStatus::SellComplete,
                    MatchStatus::Partial => ResultStatus::SellPartial,
                    MatchStatus::Resting => ResultStatus::SellPlaced,
                };
                CommandResult::with_fills(id.clone(), status, outcome.fills)
            }),
        CommandPayload::Buy {
            user_id,
            symbol,
            side,
            quantity,
            price,
        } => engine
            .submit_buy(market, user_id, symbol, *side, *price, *quantity)
            .map(|outcome| {
                let status = match outcome.status {
                    MatchStatus::Complete => ResultStatus::BuyComplete,
                    MatchStatus::Partial => ResultStatus::BuyPartial,
                    MatchStatus::Resting => ResultStatus::BuyPlaced,
                };
                CommandResult::with_fills(id.clone(), status, outcome.fills)
            }),
        CommandPayload::Reset => {
            market.reset();
            Ok(CommandResult::status(id.clone(), ResultStatus::Success))
        }
    };

    outcome.unwrap_or_else(|e: VenueError| CommandResult::status(id, e.status()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use types::ids::{MarketSymbol, UserId};
    use types::numeric::{Amount, Price, Quantity};
    use types::order::Side;
    use types::result::ResultStatus;

    struct Fixture {
        _tmp: TempDir,
        queue: Arc<CommandQueue>,
        rx: mpsc::Receiver<(u64, Command)>,
        bus: Arc<NotificationBus>,
        worker: MatchingWorker,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let (queue, rx) = CommandQueue::open(&tmp.path().join("queue"), 64).unwrap();
        let bus = Arc::new(NotificationBus::new());
        let worker = MatchingWorker::open(
            tmp.path(),
            Engine::default(),
            Arc::clone(&queue),
            Arc::clone(&bus),
        )
        .unwrap();
        Fixture {
            _tmp: tmp,
            queue,
            rx,
            bus,
            worker,
        }
    }

    fn cmd(n: u64, payload: CommandPayload) -> Command {
        Command::new(CorrelationId::new(format!("c-{n}")), payload)
    }

    async fn submit(fx: &mut Fixture, n: u64, payload: CommandPayload) -> CommandResult {
        let command = cmd(n, payload);
        let rx = fx
            .bus
            .subscribe(command.channel(), command.correlation_id.clone());
        fx.queue.enqueue(command).await.unwrap();
        let (seq, command) = fx.rx.recv().await.unwrap();
        fx.worker.handle(seq, command).await;
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_full_trading_scenario() {
        let mut fx = fixture();
        let a = UserId::new("A");
        let b = UserId::new("B");
        let symbol = MarketSymbol::new("RAIN_TOMORROW");

        let mut n = 0;
        let mut next = |p: CommandPayload| {
            n += 1;
            (n, p)
        };

        for (n, payload) in [
            next(CommandPayload::CreateUser { user_id: a.clone() }),
            next(CommandPayload::OnrampCurrency {
                user_id: a.clone(),
                amount: Amount::new(50_000),
            }),
            next(CommandPayload::CreateMarket {
                symbol: symbol.clone(),
            }),
            next(CommandPayload::Mint {
                user_id: a.clone(),
                symbol: symbol.clone(),
                quantity: Quantity::new(25),
                price: Price::new(1000),
            }),
            next(CommandPayload::CreateUser { user_id: b.clone() }),
            next(CommandPayload::OnrampCurrency {
                user_id: b.clone(),
                amount: Amount::new(20_000),
            }),
        ] {
            let result = submit(&mut fx, n, payload).await;
            assert_eq!(result.status, ResultStatus::Success);
        }

        let result = submit(
            &mut fx,
            100,
            CommandPayload::Sell {
                user_id: a.clone(),
                symbol: symbol.clone(),
                side: Side::No,
                quantity: Quantity::new(10),
                price: Price::new(1000),
            },
        )
        .await;
        assert_eq!(result.status, ResultStatus::SellPlaced);

        let result = submit(
            &mut fx,
            101,
            CommandPayload::Buy {
                user_id: b.clone(),
                symbol: symbol.clone(),
                side: Side::No,
                quantity: Quantity::new(10),
                price: Price::new(1000),
            },
        )
        .await;
        assert_eq!(result.status, ResultStatus::BuyComplete);
        assert_eq!(result.fills.get(&a), Some(&Quantity::new(10)));

        let view = fx.worker.view();
        let market = view.read().await;
        assert_eq!(market.user(&a).unwrap().balance, Amount::new(10_000));
        assert_eq!(market.user(&b).unwrap().balance, Amount::new(10_000));
        assert_eq!(market.user(&a).unwrap().locked, Amount::ZERO);
        assert_eq!(market.free_stock(&b, &symbol, Side::No), Quantity::new(10));
    }

    #[tokio::test]
    async fn test_rejection_is_recorded_but_mutates_nothing() {
        let mut fx = fixture();
        let result = submit(
            &mut fx,
            1,
            CommandPayload::OnrampCurrency {
                user_id: UserId::new("nobody"),
                amount: Amount::new(100),
            },
        )
        .await;
        assert_eq!(result.status, ResultStatus::UserNotFound);
        assert_eq!(fx.worker.applied_len(), 1);

        let view = fx.worker.view();
        assert!(view.read().await.users().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_delivery_replays_result_without_reapplying() {
        let mut fx = fixture();
        let user = UserId::new("alice");
        submit(&mut fx, 1, CommandPayload::CreateUser { user_id: user.clone() }).await;

        let onramp = cmd(
            2,
            CommandPayload::OnrampCurrency {
                user_id: user.clone(),
                amount: Amount::new(500),
            },
        );
        let rx = fx
            .bus
            .subscribe(onramp.channel(), onramp.correlation_id.clone());
        fx.queue.enqueue(onramp.clone()).await.unwrap();
        let (seq, delivered) = fx.rx.recv().await.unwrap();
        fx.worker.handle(seq, delivered).await;
        assert_eq!(rx.await.unwrap().status, ResultStatus::Success);

        // Second delivery of the same command (simulated redelivery).
        let rx = fx
            .bus
            .subscribe(onramp.channel(), onramp.correlation_id.clone());
        fx.worker.handle(seq, onramp).await;
        assert_eq!(rx.await.unwrap().status, ResultStatus::Success);

        let view = fx.worker.view();
        assert_eq!(
            view.read().await.user(&user).unwrap().balance,
            Amount::new(500),
            "credit applied exactly once"
        );
    }

    #[tokio::test]
    async fn test_state_recovered_after_restart() {
        let tmp = TempDir::new().unwrap();
        let bus = Arc::new(NotificationBus::new());
        let user = UserId::new("alice");

        {
            let (queue, mut rx) = CommandQueue::open(&tmp.path().join("queue"), 64).unwrap();
            let mut worker = MatchingWorker::open(
                tmp.path(),
                Engine::default(),
                Arc::clone(&queue),
                Arc::clone(&bus),
            )
            .unwrap();

            for (n, payload) in [
                (1, CommandPayload::CreateUser { user_id: user.clone() }),
                (
                    2,
                    CommandPayload::OnrampCurrency {
                        user_id: user.clone(),
                        amount: Amount::new(9_000),
                    },
                ),
            ] {
                queue.enqueue(cmd(n, payload)).await.unwrap();
                let (seq, command) = rx.recv().await.unwrap();
                worker.handle(seq, command).await;
            }
        }

        let (queue, mut rx) = CommandQueue::open(&tmp.path().join("queue"), 64).unwrap();
        assert!(rx.try_recv().is_err(), "everything was acked");

        let worker =
            MatchingWorker::open(tmp.path(), Engine::default(), queue, bus).unwrap();
        let view = worker.view();
        assert_eq!(
            view.read().await.user(&user).unwrap().balance,
            Amount::new(9_000)
        );
        assert_eq!(worker.applied_len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_buys_never_double_fill() {
        let tmp = TempDir::new().unwrap();
        let (queue, rx) = CommandQueue::open(&tmp.path().join("queue"), 64).unwrap();
        let bus = Arc::new(NotificationBus::new());
        let worker = MatchingWorker::open(
            tmp.path(),
            Engine::default(),
            Arc::clone(&queue),
            Arc::clone(&bus),
        )
        .unwrap();
        let view = worker.view();
        tokio::spawn(worker.run(rx));

        let seller = UserId::new("seller");
        let symbol = MarketSymbol::new("M");
        let setup: Vec<CommandPayload> = vec![
            CommandPayload::CreateUser {
                user_id: seller.clone(),
            },
            CommandPayload::OnrampCurrency {
                user_id: seller.clone(),
                amount: Amount::new(20_000),
            },
            CommandPayload::CreateMarket {
                symbol: symbol.clone(),
            },
            CommandPayload::Mint {
                user_id: seller.clone(),
                symbol: symbol.clone(),
                quantity: Quantity::new(10),
                price: Price::new(1000),
            },
            CommandPayload::CreateUser {
                user_id: UserId::new("b1"),
            },
            CommandPayload::CreateUser {
                user_id: UserId::new("b2"),
            },
            CommandPayload::CreateUser {
                user_id: UserId::new("b3"),
            },
            CommandPayload::OnrampCurrency {
                user_id: UserId::new("b1"),
                amount: Amount::new(5_000),
            },
            CommandPayload::OnrampCurrency {
                user_id: UserId::new("b2"),
                amount: Amount::new(5_000),
            },
            CommandPayload::OnrampCurrency {
                user_id: UserId::new("b3"),
                amount: Amount::new(5_000),
            },
            CommandPayload::Sell {
                user_id: seller.clone(),
                symbol: symbol.clone(),
                side: Side::Yes,
                quantity: Quantity::new(10),
                price: Price::new(500),
            },
        ];
        for payload in setup {
            let command = Command::new(CorrelationId::generate(), payload);
            let rx = bus.subscribe(command.channel(), command.correlation_id.clone());
            queue.enqueue(command).await.unwrap();
            let result = rx.await.unwrap();
            assert!(!result.status.is_rejection(), "setup failed: {:?}", result);
        }

        // Three buyers race for the 10 resting tokens.
        let mut handles = Vec::new();
        for buyer in ["b1", "b2", "b3"] {
            let queue = Arc::clone(&queue);
            let bus = Arc::clone(&bus);
            let symbol = symbol.clone();
            handles.push(tokio::spawn(async move {
                let command = Command::new(
                    CorrelationId::generate(),
                    CommandPayload::Buy {
                        user_id: UserId::new(buyer),
                        symbol,
                        side: Side::Yes,
                        quantity: Quantity::new(5),
                        price: Price::new(500),
                    },
                );
                let rx = bus.subscribe(command.channel(), command.correlation_id.clone());
                queue.enqueue(command).await.unwrap();
                rx.await.unwrap()
            }));
        }

        let mut total_filled = Quantity::ZERO;
        for handle in handles {
            let result = handle.await.unwrap();
            let filled: u64 = result.fills.values().map(|q| q.get()).sum();
            total_filled = total_filled
                .checked_add(Quantity::new(filled))
                .unwrap();
        }
        // Exactly the resting quantity was distributed, never more.
        assert_eq!(total_filled, Quantity::new(10));

        let market = view.read().await;
        let seller_yes = market.portfolio(&seller, &symbol).unwrap().side(Side::Yes);
        assert_eq!(seller_yes.locked, Quantity::ZERO);
        let buyer_total: u64 = ["b1", "b2", "b3"]
            .iter()
            .map(|b| market.free_stock(&UserId::new(*b), &symbol, Side::Yes).get())
            .sum();
        assert_eq!(buyer_total, 10);
    }

    #[tokio::test]
    async fn test_reset_wipes_market_state() {
        let mut fx = fixture();
        let user = UserId::new("alice");
        submit(&mut fx, 1, CommandPayload::CreateUser { user_id: user.clone() }).await;

        let result = submit(&mut fx, 2, CommandPayload::Reset).await;
        assert_eq!(result.status, ResultStatus::Success);

        let view = fx.worker.view();
        assert!(view.read().await.users().is_empty());
    }

    #[test]
    fn test_applied_window_evicts_oldest() {
        let mut window = AppliedWindow::default();
        for n in 0..(APPLIED_WINDOW + 10) {
            window.insert(CommandResult::status(
                CorrelationId::new(format!("c-{n}")),
                ResultStatus::Success,
            ));
        }
        assert_eq!(window.len(), APPLIED_WINDOW);
        assert!(window.get(&CorrelationId::new("c-0")).is_none());
        assert!(window
            .get(&CorrelationId::new(format!("c-{}", APPLIED_WINDOW + 9)))
            .is_some());
    }
}
