//! SQLite-backed read-through cache for scraped metadata.
//!
//! The cache is not the source of truth; the upstream scraper is. Every
//! entry can be rebuilt by re-indexing, which is what makes the runtime
//! driver swap and the destructive admin operations safe to offer.
//!
//! # Architecture
//! - **Entries**: denormalized records keyed by upstream id, carrying a
//!   blake3 fingerprint of the canonical payload plus freshness timestamps
//!   (`last_indexed_at`, `expires_at`, always written together).
//! - **Blacklist**: durable exclusion set with a lock-free snapshot view;
//!   blacklisted ids are invisible to reads and to scheduler selection.
//! - **Jobs**: the refresh queue shares this database; its repository lives
//!   in the index crate, the schema lives here with the other migrations.

mod blacklist;
mod db;
mod driver;
pub mod error;
mod events;
mod models;
mod settings;
mod store;

pub use crate::blacklist::{Blacklist, BlacklistView};
pub use crate::db::Database;
pub use crate::driver::{DriverHandle, EntryDriver, MemoryDriver, SqliteDriver};
pub use crate::events::ChangeEvent;
pub use crate::models::{BlacklistEntry, CacheEntry};
pub use crate::settings::{CacheDriver, CacheMethod};
pub use crate::store::{CacheStore, Lookup, PutOutcome};
