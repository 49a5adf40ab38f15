use matching_engine::MarketStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use worker::{CommandQueue, NotificationBus};

/// Shared handles every handler needs: the durable queue for writes, the
/// notification bus for correlated results, and the worker-maintained read
/// view for queries.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<CommandQueue>,
    pub bus: Arc<NotificationBus>,
    pub view: Arc<RwLock<MarketStore>>,
    pub request_timeout: Duration,
}
