//! Durable command queue
//!
//! Commands are journaled before the worker ever sees them: `enqueue`
//! appends to the journal with fsync, then hands the command to the worker
//! over an in-process channel. The worker acks a sequence only after the
//! command's effects are snapshotted, so anything unacked at startup is
//! redelivered through the same channel.

use persistence::journal::{Journal, JournalError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use types::command::Command;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("worker has shut down")]
    WorkerGone,
}

pub struct CommandQueue {
    journal: Mutex<Journal<Command>>,
    tx: mpsc::Sender<(u64, Command)>,
}

impl CommandQueue {
    /// Open the queue in `dir` and return it with the worker's receiving
    /// end. Unacked commands from a previous run are redelivered first.
    pub fn open(
        dir: &Path,
        capacity: usize,
    ) -> Result<(Arc<Self>, mpsc::Receiver<(u64, Command)>), QueueError> {
        let journal = Journal::open(dir)?;
        let pending = journal.unacked()?;
        if !pending.is_empty() {
            info!(count = pending.len(), "redelivering unacked commands");
        }

        let (tx, rx) = mpsc::channel(pending.len() + capacity.max(1));
        for item in pending {
            // Capacity covers every pending item and the receiver is live.
            tx.try_send(item).map_err(|_| QueueError::WorkerGone)?;
        }

        let queue = Arc::new(Self {
            journal: Mutex::new(journal),
            tx,
        });
        Ok((queue, rx))
    }

    /// Journal a command durably, then hand it to the worker. Returns the
    /// journal sequence.
    pub async fn enqueue(&self, command: Command) -> Result<u64, QueueError> {
        let seq = self.journal.lock().await.append(&command)?;
        self.tx
            .send((seq, command))
            .await
            .map_err(|_| QueueError::WorkerGone)?;
        Ok(seq)
    }

    /// Mark a command as fully applied and persisted.
    pub async fn ack(&self, seq: u64) -> Result<(), QueueError> {
        self.journal.lock().await.ack(seq)?;
        Ok(())
    }
}
