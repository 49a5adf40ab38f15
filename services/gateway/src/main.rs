mod config;
mod error;
mod handlers;
mod models;
mod router;
mod state;

use config::GatewayConfig;
use matching_engine::Engine;
use router::create_router;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use worker::{CommandQueue, MatchingWorker, NotificationBus};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;
    tracing::info!(?config, "starting venue gateway");

    let (queue, rx) = CommandQueue::open(&config.data_dir.join("queue"), config.queue_capacity)?;
    let bus = Arc::new(NotificationBus::new());
    let worker = MatchingWorker::open(
        &config.data_dir,
        Engine::default(),
        Arc::clone(&queue),
        Arc::clone(&bus),
    )?;
    let view = worker.view();
    tokio::spawn(worker.run(rx));

    let state = AppState {
        queue,
        bus,
        view,
        request_timeout: config.request_timeout,
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
