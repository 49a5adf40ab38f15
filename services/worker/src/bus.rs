//! Correlated result notification
//!
//! One waiter per (channel, correlation id). A caller subscribes before
//! enqueueing its command, so the worker's publish can never race past it;
//! publishing consumes the registration, so a result is delivered to
//! exactly one waiter and a slow command can never leak its outcome to a
//! later caller on the same channel.

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use types::ids::CorrelationId;
use types::result::CommandResult;

#[derive(Default)]
pub struct NotificationBus {
    waiters: DashMap<(String, CorrelationId), oneshot::Sender<CommandResult>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for the result of one command. The returned
    /// receiver resolves when the worker publishes on this channel with
    /// this correlation id.
    pub fn subscribe(
        &self,
        channel: &str,
        correlation_id: CorrelationId,
    ) -> oneshot::Receiver<CommandResult> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert((channel.to_string(), correlation_id), tx);
        rx
    }

    /// Drop a registration, typically after the caller timed out.
    pub fn unsubscribe(&self, channel: &str, correlation_id: &CorrelationId) {
        self.waiters
            .remove(&(channel.to_string(), correlation_id.clone()));
    }

    /// Deliver a result to its waiter, if one is still registered. A
    /// missing waiter is normal after a caller timeout or a redelivered
    /// command.
    pub fn publish(&self, channel: &str, result: CommandResult) {
        let key = (channel.to_string(), result.correlation_id.clone());
        match self.waiters.remove(&key) {
            Some((_, waiter)) => {
                if waiter.send(result).is_err() {
                    debug!(channel, correlation_id = %key.1, "waiter dropped before delivery");
                }
            }
            None => {
                // The caller timed out or this is a redelivered command.
                warn!(channel, correlation_id = %key.1, "no waiter for result");
            }
        }
    }

    /// Number of registered waiters.
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::result::ResultStatus;

    #[tokio::test]
    async fn test_publish_resolves_matching_waiter_only() {
        let bus = NotificationBus::new();
        let slow = bus.subscribe("buy", CorrelationId::new("slow"));
        let mut fast = bus.subscribe("buy", CorrelationId::new("fast"));

        bus.publish(
            "buy",
            CommandResult::status(CorrelationId::new("slow"), ResultStatus::BuyComplete),
        );

        let result = slow.await.unwrap();
        assert_eq!(result.correlation_id, CorrelationId::new("slow"));
        assert_eq!(result.status, ResultStatus::BuyComplete);

        // The other waiter on the same channel is untouched.
        assert!(fast.try_recv().is_err());
        assert_eq!(bus.waiter_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_waiter_is_harmless() {
        let bus = NotificationBus::new();
        bus.publish(
            "sell",
            CommandResult::status(CorrelationId::new("ghost"), ResultStatus::SellPlaced),
        );
        assert_eq!(bus.waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_waiter() {
        let bus = NotificationBus::new();
        let id = CorrelationId::new("c-1");
        let _rx = bus.subscribe("mint", id.clone());
        assert_eq!(bus.waiter_count(), 1);

        bus.unsubscribe("mint", &id);
        assert_eq!(bus.waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_same_correlation_id_on_different_channels() {
        let bus = NotificationBus::new();
        let id = CorrelationId::new("shared");
        let buy = bus.subscribe("buy", id.clone());
        let mut sell = bus.subscribe("sell", id.clone());

        bus.publish("buy", CommandResult::status(id, ResultStatus::BuyPlaced));

        assert_eq!(buy.await.unwrap().status, ResultStatus::BuyPlaced);
        assert!(sell.try_recv().is_err());
    }
}
