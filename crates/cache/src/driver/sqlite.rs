//! Durable entry transport backed by the cache database.

use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;

use super::EntryDriver;
use crate::error::{ErrorKind, Result};
use crate::models::{CacheEntry, EntryRow};

/// Entry storage in the `entries` table of the cache database.
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntryDriver for SqliteDriver {
    async fn get(&self, id: u64) -> Result<Option<CacheEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(include_str!("../../queries/get_entry.sql"))
            .bind(to_db_id(id)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => row.into_entry(),
            None => Ok(None),
        }
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        let row = EntryRow::try_from(entry)?;
        sqlx::query(include_str!("../../queries/upsert_entry.sql"))
            .bind(row.mal_id)
            .bind(row.payload)
            .bind(row.fingerprint)
            .bind(row.expires_at)
            .bind(row.last_indexed_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn touch(&self, id: u64, last_indexed_at: UtcDateTime, expires_at: UtcDateTime) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/touch_entry.sql"))
            .bind(last_indexed_at.unix_timestamp())
            .bind(expires_at.unix_timestamp())
            .bind(to_db_id(id)?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/delete_entry.sql"))
            .bind(to_db_id(id)?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn track(&self, id: u64) -> Result<()> {
        sqlx::query(include_str!("../../queries/track_entry.sql"))
            .bind(to_db_id(id)?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn stale(&self, now: UtcDateTime) -> Result<Vec<u64>> {
        let ids: Vec<i64> = sqlx::query_scalar(include_str!("../../queries/stale_entries.sql"))
            .bind(now.unix_timestamp())
            .fetch_all(&self.pool)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use serde_json::json;

    fn entry(id: u64, fingerprint: &str, expires_at: UtcDateTime) -> CacheEntry {
        CacheEntry {
            mal_id: id,
            payload: json!({"mal_id": id}),
            fingerprint: fingerprint.to_string(),
            last_indexed_at: expires_at - time::Duration::hours(24),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = Database::connect_in_memory().await.unwrap();
        let driver = SqliteDriver::new(db.pool().clone());
        let now = UtcDateTime::now();
        driver.upsert(&entry(42, "fp1", now)).await.unwrap();
        let fetched = driver.get(42).await.unwrap().unwrap();
        assert_eq!(fetched.fingerprint, "fp1");
        assert!(driver.get(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tracked_placeholder_is_invisible_to_get_but_stale() {
        let db = Database::connect_in_memory().await.unwrap();
        let driver = SqliteDriver::new(db.pool().clone());
        driver.track(42).await.unwrap();
        assert!(driver.get(42).await.unwrap().is_none());
        let stale = driver.stale(UtcDateTime::now()).await.unwrap();
        assert_eq!(stale, vec![42]);
    }

    #[tokio::test]
    async fn test_track_never_clobbers_an_entry() {
        let db = Database::connect_in_memory().await.unwrap();
        let driver = SqliteDriver::new(db.pool().clone());
        let now = UtcDateTime::now();
        driver.upsert(&entry(42, "fp1", now + time::Duration::hours(24))).await.unwrap();
        driver.track(42).await.unwrap();
        assert!(driver.get(42).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_order_is_deterministic() {
        let db = Database::connect_in_memory().await.unwrap();
        let driver = SqliteDriver::new(db.pool().clone());
        let now = UtcDateTime::now();
        // Fresh entry must not appear.
        driver.upsert(&entry(1, "a", now + time::Duration::hours(24))).await.unwrap();
        // Two expired entries, one staler than the other.
        driver.upsert(&entry(9, "b", now - time::Duration::hours(1))).await.unwrap();
        driver.upsert(&entry(5, "c", now - time::Duration::hours(2))).await.unwrap();
        // Never indexed sorts first.
        driver.track(7).await.unwrap();
        let stale = driver.stale(now).await.unwrap();
        assert_eq!(stale, vec![7, 5, 9]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        let driver = SqliteDriver::new(db.pool().clone());
        driver.upsert(&entry(42, "fp1", UtcDateTime::now())).await.unwrap();
        assert!(driver.delete(42).await.unwrap());
        assert!(!driver.delete(42).await.unwrap());
    }
}
