//! Entry storage transports.
//!
//! The cache's durable state can live in SQLite (default) or in a volatile
//! in-process map. Both sit behind [`EntryDriver`] so that the operator can
//! swap the transport at runtime through [`CacheStore`](crate::CacheStore)
//! without any caller noticing.

mod memory;
mod sqlite;

pub use self::memory::MemoryDriver;
pub use self::sqlite::SqliteDriver;
use crate::error::Result;
use crate::models::CacheEntry;
use async_trait::async_trait;
use std::sync::Arc;
use time::UtcDateTime;

pub type DriverHandle = Arc<dyn EntryDriver + Send + Sync>;

/// Unified interface over entry storage transports.
///
/// Operations are keyed by the upstream id. Placeholder rows (ids tracked
/// for indexing that were never fetched) exist inside the driver but are
/// only observable through [`stale`](Self::stale); `get` returns
/// materialized entries exclusively.
#[async_trait]
pub trait EntryDriver: Send + Sync {
    /// Fetch a materialized entry.
    async fn get(&self, id: u64) -> Result<Option<CacheEntry>>;

    /// Insert or overwrite an entry.
    async fn upsert(&self, entry: &CacheEntry) -> Result<()>;

    /// Bump freshness timestamps without touching payload or fingerprint.
    ///
    /// Returns `false` if no entry exists for the id.
    async fn touch(&self, id: u64, last_indexed_at: UtcDateTime, expires_at: UtcDateTime) -> Result<bool>;

    /// Delete an entry (or placeholder). Returns whether a row existed.
    async fn delete(&self, id: u64) -> Result<bool>;

    /// Register an id for indexing without a payload. Idempotent: an
    /// existing entry or placeholder is left untouched.
    async fn track(&self, id: u64) -> Result<()>;

    /// Ids due for (re-)indexing: never indexed or expired at `now`,
    /// stalest first (never-indexed counts as infinitely stale), ties
    /// broken by ascending id.
    async fn stale(&self, now: UtcDateTime) -> Result<Vec<u64>>;
}
