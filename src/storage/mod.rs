//! Message log backends
//!
//! - Memory: process-local log, the default when no database is configured
//! - Postgres: durable log shared by every server instance
//!
//! Both assign `created_at` under an append lock so timestamps strictly
//! increase in append order, even if the wall clock stalls or steps back.

mod memory;
mod postgres;

pub use memory::{Clock, MemoryStore};
pub use postgres::{PostgresConfig, PostgresStore};

use crate::messages::{Cursor, Message, NewMessage};
pub use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Append-only message log
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Assign id and timestamp, store, and return the stored message
    async fn append(&self, message: NewMessage) -> Result<Message, StorageError>;

    /// All messages created strictly after `cursor`, oldest first
    async fn since(&self, cursor: Cursor) -> Result<Vec<Message>, StorageError>;

    /// Look up a single message
    async fn get(&self, id: Uuid) -> Result<Option<Message>, StorageError>;

    /// The newest `limit` messages, oldest first
    async fn recent(&self, limit: usize) -> Result<Vec<Message>, StorageError>;
}

/// Timestamp for the next append: `now` at microsecond resolution, bumped
/// one microsecond past `last` when the clock has not moved beyond it.
pub fn next_timestamp(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(6);
    match last {
        Some(last) if last >= now => last + Duration::microseconds(1),
        _ => now,
    }
}
