//! Environment-driven configuration.

use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TCP port to listen on (`PORT`, default 3000).
    pub port: u16,
    /// Directory for the command journal and state snapshots
    /// (`DATA_DIR`, default `./data`).
    pub data_dir: PathBuf,
    /// How long a request waits for its command result before reporting an
    /// unknown outcome (`REQUEST_TIMEOUT_MS`, default 5000).
    pub request_timeout: Duration,
    /// In-flight command buffer between gateway and worker
    /// (`QUEUE_CAPACITY`, default 256).
    pub queue_capacity: usize,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("invalid PORT")?,
            Err(_) => 3000,
        };
        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let request_timeout = match std::env::var("REQUEST_TIMEOUT_MS") {
            Ok(raw) => Duration::from_millis(raw.parse().context("invalid REQUEST_TIMEOUT_MS")?),
            Err(_) => Duration::from_millis(5000),
        };
        let queue_capacity = match std::env::var("QUEUE_CAPACITY") {
            Ok(raw) => raw.parse().context("invalid QUEUE_CAPACITY")?,
            Err(_) => 256,
        };
        Ok(Self {
            port,
            data_dir,
            request_timeout,
            queue_capacity,
        })
    }
}
