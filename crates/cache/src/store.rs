//! The read-through cache store.

use std::sync::Arc;
use time::{Duration, UtcDateTime};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::blacklist::BlacklistView;
use crate::db::Database;
use crate::driver::{DriverHandle, MemoryDriver, SqliteDriver};
use crate::error::Result;
use crate::events::{ChangeEvent, Events};
use crate::models::CacheEntry;
use crate::settings::{CacheDriver, CacheMethod};
use koyomi_record::Record;
use sqlx::SqlitePool;

/// Result of a cache read.
///
/// Staleness is flagged, never hidden: an expired entry is still served so
/// that consumers can prefer stale-but-present data over a hard miss. Only
/// unindexed or blacklisted ids come back [`Missing`](Lookup::Missing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Fresh(CacheEntry),
    Stale(CacheEntry),
    Missing,
}

impl Lookup {
    /// The entry, if any, regardless of freshness.
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            Self::Fresh(entry) | Self::Stale(entry) => Some(entry),
            Self::Missing => None,
        }
    }
}

/// What a `put` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// First successful fetch for this id.
    Created,
    /// Fingerprint changed: payload overwritten, change event emitted.
    Updated,
    /// Fingerprint identical: only the freshness timestamps were bumped.
    Unchanged,
}

// The driver/method pair swaps as a unit so no operation can observe a
// half-applied configuration.
struct Runtime {
    driver: DriverHandle,
    driver_kind: CacheDriver,
    method: CacheMethod,
}

/// Read-through cache over a swappable entry transport.
///
/// Reads consult the blacklist snapshot first; misses never trigger a
/// synchronous upstream fetch (indexing is the scheduler's job). All
/// operations hold the runtime configuration read guard for their full
/// duration, so [`set_driver`](Self::set_driver) /
/// [`set_method`](Self::set_method), which take the write guard, commit
/// only once in-flight operations have completed.
pub struct CacheStore {
    pool: SqlitePool,
    runtime: RwLock<Runtime>,
    blacklist: BlacklistView,
    events: Events,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(
        db: &Database,
        blacklist: BlacklistView,
        ttl: Duration,
        driver: CacheDriver,
        method: CacheMethod,
    ) -> Self {
        let pool = db.pool().clone();
        let runtime = Runtime {
            driver: build_driver(driver, &pool),
            driver_kind: driver,
            method,
        };
        Self {
            pool,
            runtime: RwLock::new(runtime),
            blacklist,
            events: Events::new(),
            ttl,
        }
    }

    /// Look up an entry by id.
    ///
    /// Blacklisted ids are [`Missing`](Lookup::Missing) unconditionally,
    /// even when an entry row exists underneath.
    pub async fn get(&self, id: u64) -> Result<Lookup> {
        if self.blacklist.contains(id) {
            return Ok(Lookup::Missing);
        }
        let runtime = self.runtime.read().await;
        let Some(entry) = runtime.driver.get(id).await? else {
            return Ok(Lookup::Missing);
        };
        let lookup = match runtime.method {
            // Bypass serves stored data without freshness classification.
            CacheMethod::Bypass => Lookup::Fresh(entry),
            CacheMethod::Refresh if entry.is_expired(UtcDateTime::now()) => Lookup::Stale(entry),
            CacheMethod::Refresh => Lookup::Fresh(entry),
        };
        Ok(lookup)
    }

    /// Write back a canonicalized record.
    ///
    /// The fingerprint decides how much actually changes: an identical
    /// fingerprint bumps `last_indexed_at`/`expires_at` only (no change
    /// event), a differing one overwrites payload and fingerprint and
    /// emits a [`ChangeEvent`].
    #[instrument(skip(self, record), fields(mal_id = record.id()))]
    pub async fn put(&self, record: &Record) -> Result<PutOutcome> {
        let now = UtcDateTime::now();
        let expires_at = now + self.ttl;
        let fingerprint = record.fingerprint();
        let runtime = self.runtime.read().await;

        // The touch can still miss when a purge lands between the read and
        // the bump; in that case fall through and write the full entry.
        if let Some(existing) = runtime.driver.get(record.id()).await?
            && existing.fingerprint == fingerprint
            && runtime.driver.touch(record.id(), now, expires_at).await?
        {
            debug!("fingerprint unchanged, bumped timestamps");
            return Ok(PutOutcome::Unchanged);
        }

        let created = runtime.driver.get(record.id()).await?.is_none();
        let entry = CacheEntry {
            mal_id: record.id(),
            payload: record.payload().clone(),
            fingerprint: fingerprint.clone(),
            last_indexed_at: now,
            expires_at,
        };
        runtime.driver.upsert(&entry).await?;
        self.events.emit(ChangeEvent { mal_id: record.id(), fingerprint });
        Ok(if created { PutOutcome::Created } else { PutOutcome::Updated })
    }

    /// Delete an entry unconditionally. Idempotent; returns whether a row
    /// existed (the CLI maps that to its exit code).
    pub async fn purge(&self, id: u64) -> Result<bool> {
        let runtime = self.runtime.read().await;
        let existed = runtime.driver.delete(id).await?;
        info!(mal_id = id, existed, "purged cache entry");
        Ok(existed)
    }

    /// Register an id for indexing without fetching it.
    pub async fn track(&self, id: u64) -> Result<()> {
        let runtime = self.runtime.read().await;
        runtime.driver.track(id).await
    }

    /// Ids due for (re-)indexing at `now`, stalest first, already filtered
    /// through the blacklist snapshot.
    pub async fn stale_ids(&self, now: UtcDateTime) -> Result<Vec<u64>> {
        let runtime = self.runtime.read().await;
        let ids = runtime.driver.stale(now).await?;
        Ok(ids.into_iter().filter(|id| !self.blacklist.contains(*id)).collect())
    }

    /// Subscribe to content change events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    pub async fn driver(&self) -> CacheDriver {
        self.runtime.read().await.driver_kind
    }

    pub async fn method(&self) -> CacheMethod {
        self.runtime.read().await.method
    }

    /// Swap the entry transport.
    ///
    /// The write guard waits for in-flight reads/writes (which hold read
    /// guards) to complete, so the swap commits atomically: everything
    /// before it ran fully on the old driver, everything after runs fully
    /// on the new one.
    pub async fn set_driver(&self, driver: CacheDriver) -> Result<()> {
        let mut runtime = self.runtime.write().await;
        if runtime.driver_kind == driver {
            return Ok(());
        }
        runtime.driver = build_driver(driver, &self.pool);
        let previous = runtime.driver_kind;
        runtime.driver_kind = driver;
        info!(from = %previous, to = %driver, "swapped cache driver");
        Ok(())
    }

    #[cfg(test)]
    async fn install_driver(&self, driver: DriverHandle) {
        self.runtime.write().await.driver = driver;
    }

    /// Swap the read strategy. Same commit semantics as
    /// [`set_driver`](Self::set_driver).
    pub async fn set_method(&self, method: CacheMethod) -> Result<()> {
        let mut runtime = self.runtime.write().await;
        if runtime.method != method {
            info!(from = %runtime.method, to = %method, "swapped cache method");
            runtime.method = method;
        }
        Ok(())
    }
}

fn build_driver(kind: CacheDriver, pool: &SqlitePool) -> DriverHandle {
    match kind {
        CacheDriver::Sqlite => Arc::new(SqliteDriver::new(pool.clone())),
        CacheDriver::Memory => Arc::new(MemoryDriver::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blacklist::Blacklist;
    use serde_json::json;

    const DAY: Duration = Duration::hours(24);

    async fn fixture(ttl: Duration) -> (Database, Blacklist, CacheStore) {
        let db = Database::connect_in_memory().await.unwrap();
        let blacklist = Blacklist::load(&db).await.unwrap();
        let store = CacheStore::new(&db, blacklist.view(), ttl, CacheDriver::Sqlite, CacheMethod::Refresh);
        (db, blacklist, store)
    }

    fn record(id: u64, episodes: u64) -> Record {
        Record::from_raw(json!({"mal_id": id, "episodes": episodes})).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get_is_fresh() {
        let (_db, _blacklist, store) = fixture(DAY).await;
        assert_eq!(store.put(&record(42, 26)).await.unwrap(), PutOutcome::Created);
        let Lookup::Fresh(entry) = store.get(42).await.unwrap() else {
            panic!("expected a fresh entry");
        };
        assert_eq!(entry.payload["episodes"], json!(26));
    }

    #[tokio::test]
    async fn test_miss_is_missing_and_has_no_side_effects() {
        let (_db, _blacklist, store) = fixture(DAY).await;
        assert_eq!(store.get(42).await.unwrap(), Lookup::Missing);
        // A read miss must not register the id for indexing.
        assert!(store.stale_ids(UtcDateTime::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blacklist_hides_existing_entry() {
        let (_db, blacklist, store) = fixture(DAY).await;
        store.put(&record(42, 26)).await.unwrap();
        blacklist.add(42, "dmca").await.unwrap();
        assert_eq!(store.get(42).await.unwrap(), Lookup::Missing);
        // And the scheduler never selects it either.
        store.track(42).await.unwrap();
        assert!(!store.stale_ids(UtcDateTime::now() + DAY * 2).await.unwrap().contains(&42));
    }

    #[tokio::test]
    async fn test_expired_entry_is_served_stale() {
        let (_db, _blacklist, store) = fixture(Duration::seconds(0)).await;
        store.put(&record(42, 26)).await.unwrap();
        assert!(matches!(store.get(42).await.unwrap(), Lookup::Stale(_)));
    }

    #[tokio::test]
    async fn test_bypass_method_suppresses_staleness() {
        let (_db, _blacklist, store) = fixture(Duration::seconds(0)).await;
        store.put(&record(42, 26)).await.unwrap();
        store.set_method(CacheMethod::Bypass).await.unwrap();
        assert!(matches!(store.get(42).await.unwrap(), Lookup::Fresh(_)));
    }

    #[tokio::test]
    async fn test_unchanged_put_bumps_timestamps_without_event() {
        let (_db, _blacklist, store) = fixture(DAY).await;
        store.put(&record(42, 26)).await.unwrap();
        let before = store.get(42).await.unwrap().entry().unwrap().clone();

        let mut events = store.subscribe();
        assert_eq!(store.put(&record(42, 26)).await.unwrap(), PutOutcome::Unchanged);
        let after = store.get(42).await.unwrap().entry().unwrap().clone();

        assert_eq!(after.fingerprint, before.fingerprint);
        assert_eq!(after.payload, before.payload);
        assert!(after.last_indexed_at >= before.last_indexed_at);
        assert!(events.try_recv().is_err(), "unchanged put must not emit");
    }

    #[tokio::test]
    async fn test_changed_put_overwrites_and_emits() {
        let (_db, _blacklist, store) = fixture(DAY).await;
        store.put(&record(42, 26)).await.unwrap();
        let before = store.get(42).await.unwrap().entry().unwrap().clone();

        let mut events = store.subscribe();
        assert_eq!(store.put(&record(42, 27)).await.unwrap(), PutOutcome::Updated);
        let after = store.get(42).await.unwrap().entry().unwrap().clone();

        assert_ne!(after.fingerprint, before.fingerprint);
        assert_eq!(after.payload["episodes"], json!(27));
        let event = events.try_recv().unwrap();
        assert_eq!(event.mal_id, 42);
        assert_eq!(event.fingerprint, after.fingerprint);
    }

    /// Transport that can drop an entry right after serving a read, the
    /// window in which an admin purge can race an unchanged write-back.
    #[derive(Default)]
    struct RacingPurgeDriver {
        inner: MemoryDriver,
        purge_after_read: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl crate::driver::EntryDriver for RacingPurgeDriver {
        async fn get(&self, id: u64) -> Result<Option<CacheEntry>> {
            let entry = self.inner.get(id).await?;
            if self.purge_after_read.swap(false, std::sync::atomic::Ordering::SeqCst) {
                self.inner.delete(id).await?;
            }
            Ok(entry)
        }

        async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
            self.inner.upsert(entry).await
        }

        async fn touch(&self, id: u64, last_indexed_at: UtcDateTime, expires_at: UtcDateTime) -> Result<bool> {
            self.inner.touch(id, last_indexed_at, expires_at).await
        }

        async fn delete(&self, id: u64) -> Result<bool> {
            self.inner.delete(id).await
        }

        async fn track(&self, id: u64) -> Result<()> {
            self.inner.track(id).await
        }

        async fn stale(&self, now: UtcDateTime) -> Result<Vec<u64>> {
            self.inner.stale(now).await
        }
    }

    #[tokio::test]
    async fn test_unchanged_put_racing_a_purge_still_writes() {
        let (_db, _blacklist, store) = fixture(DAY).await;
        let driver = Arc::new(RacingPurgeDriver::default());
        store.install_driver(driver.clone()).await;
        store.put(&record(42, 26)).await.unwrap();

        // The entry vanishes between the fingerprint comparison and the
        // timestamp bump. The put must not report Unchanged while leaving
        // nothing behind.
        driver.purge_after_read.store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(store.put(&record(42, 26)).await.unwrap(), PutOutcome::Created);
        assert!(matches!(store.get(42).await.unwrap(), Lookup::Fresh(_)));
    }

    #[tokio::test]
    async fn test_purge_is_idempotent() {
        let (_db, _blacklist, store) = fixture(DAY).await;
        store.put(&record(42, 26)).await.unwrap();
        assert!(store.purge(42).await.unwrap());
        assert!(!store.purge(42).await.unwrap());
        assert_eq!(store.get(42).await.unwrap(), Lookup::Missing);
    }

    #[tokio::test]
    async fn test_driver_swap_survives_reads() {
        let (_db, _blacklist, store) = fixture(DAY).await;
        store.put(&record(42, 26)).await.unwrap();
        store.set_driver(CacheDriver::Memory).await.unwrap();
        assert_eq!(store.driver().await, CacheDriver::Memory);
        // Memory starts empty; reads still succeed (as misses) and a new
        // put lands on the new transport.
        assert_eq!(store.get(42).await.unwrap(), Lookup::Missing);
        store.put(&record(42, 26)).await.unwrap();
        assert!(matches!(store.get(42).await.unwrap(), Lookup::Fresh(_)));
    }
}
