//! Id exclusion set.
//!
//! Durable rows in the `blacklist` table plus an in-memory snapshot
//! published through a watch channel. Membership checks read the snapshot
//! (an `Arc<HashSet>` clone), so a blacklist check never blocks a cache
//! read, no matter what mutation is in progress.

use exn::ResultExt;
use std::collections::HashSet;
use std::sync::Arc;
use time::UtcDateTime;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{BlacklistEntry, BlacklistRow};
use sqlx::SqlitePool;

/// Snapshot-readable view handed to the cache store and scheduler.
///
/// Cheap to clone; always reflects the latest committed snapshot.
#[derive(Debug, Clone)]
pub struct BlacklistView {
    snapshot: watch::Receiver<Arc<HashSet<u64>>>,
}

impl BlacklistView {
    pub fn contains(&self, id: u64) -> bool {
        self.snapshot.borrow().contains(&id)
    }
}

/// Owner of the blacklist: durable mutations plus snapshot publication.
#[derive(Debug)]
pub struct Blacklist {
    pool: SqlitePool,
    snapshot: watch::Sender<Arc<HashSet<u64>>>,
}

impl Blacklist {
    /// Load the persisted set and publish the initial snapshot.
    pub async fn load(db: &Database) -> Result<Self> {
        let pool = db.pool().clone();
        let ids = Self::read_ids(&pool).await?;
        let (snapshot, _) = watch::channel(Arc::new(ids));
        Ok(Self { pool, snapshot })
    }

    /// A lock-free view for readers.
    pub fn view(&self) -> BlacklistView {
        BlacklistView { snapshot: self.snapshot.subscribe() }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.snapshot.borrow().contains(&id)
    }

    /// Add an id. Idempotent: re-adding keeps the original reason.
    pub async fn add(&self, id: u64, reason: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO blacklist (mal_id, reason, added_at) VALUES (?, ?, ?)")
            .bind(to_db_id(id)?)
            .bind(reason)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        info!(mal_id = id, reason, "blacklisted id");
        self.refresh().await
    }

    /// Remove an id. Idempotent; returns whether it was present.
    pub async fn remove(&self, id: u64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blacklist WHERE mal_id = ?")
            .bind(to_db_id(id)?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        self.refresh().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every entry in one atomic statement.
    ///
    /// Destructive and irreversible, hence the WARN.
    pub async fn flush(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM blacklist")
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let removed = result.rows_affected();
        warn!(removed, "flushed the entire blacklist");
        self.refresh().await?;
        Ok(removed)
    }

    /// Full entries, most recent first, for operator listing.
    pub async fn entries(&self) -> Result<Vec<BlacklistEntry>> {
        let rows: Vec<BlacklistRow> =
            sqlx::query_as("SELECT mal_id, reason, added_at FROM blacklist ORDER BY added_at DESC, mal_id ASC")
                .fetch_all(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(BlacklistEntry::try_from).collect()
    }

    async fn refresh(&self) -> Result<()> {
        let ids = Self::read_ids(&self.pool).await?;
        _ = self.snapshot.send(Arc::new(ids));
        Ok(())
    }

    async fn read_ids(pool: &SqlitePool) -> Result<HashSet<u64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT mal_id FROM blacklist")
            .fetch_all(pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        ids.into_iter()
            .map(|id| u64::try_from(id).or_raise(|| ErrorKind::InvalidData("mal id")))
            .collect()
    }
}

fn to_db_id(id: u64) -> Result<i64> {
    i64::try_from(id).or_raise(|| ErrorKind::InvalidData("mal id"))
}
