//! Durable storage for the command pipeline
//!
//! Two building blocks:
//! - an append-only [`journal::Journal`] with per-record CRC32C checksums
//!   and an acknowledgement cursor, giving the command queue at-least-once
//!   redelivery across restarts
//! - a [`snapshot::DocumentStore`] that persists the whole worker state as
//!   one integrity-checked document, written atomically after every
//!   applied command

pub mod journal;
pub mod snapshot;

pub use journal::{Journal, JournalError};
pub use snapshot::{DocumentStore, StoreError};
