//! Periodic pass that turns stale cache entries into queued refresh jobs.

use std::sync::Arc;
use std::time::Duration;

use exn::ResultExt;
use koyomi_cache::CacheStore;
use time::UtcDateTime;
use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::error::{ErrorKind, Result};
use crate::queue::JobQueue;

/// What a single scheduling pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// Stale ids the store reported, after blacklist filtering.
    pub examined: usize,
    /// Ids that got a new job; the rest already had one in some state.
    pub enqueued: usize,
}

pub struct Scheduler {
    store: Arc<CacheStore>,
    queue: JobQueue,
    period: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<CacheStore>, queue: JobQueue, period: Duration) -> Self {
        Self { store, queue, period }
    }

    /// One scheduling pass: list stale ids, enqueue a job per id. Duplicates
    /// are absorbed by the queue, so overlapping passes and operator-seeded
    /// jobs never double up. A store failure aborts the pass without partial
    /// cleanup; whatever was enqueued so far stands and the rest is picked
    /// up next pass.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<PassSummary> {
        let now = UtcDateTime::now();
        let candidates = self.store.stale_ids(now).await.or_raise(|| ErrorKind::Store)?;
        let mut enqueued = 0;
        for id in &candidates {
            if self.queue.enqueue(*id, now).await? {
                enqueued += 1;
            }
        }
        let summary = PassSummary { examined: candidates.len(), enqueued };
        info!(examined = summary.examined, enqueued = summary.enqueued, "scheduling pass complete");
        Ok(summary)
    }

    /// Run passes forever at the configured period, starting with one
    /// immediately. A failed pass is logged and the loop keeps going.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = self.run_once().await {
                        error!(%error, "scheduling pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koyomi_cache::{Blacklist, CacheDriver, CacheMethod, Database};
    use koyomi_record::Record;
    use serde_json::json;

    async fn fixture() -> (Database, Arc<CacheStore>, Scheduler) {
        let db = Database::connect_in_memory().await.unwrap();
        let blacklist = Blacklist::load(&db).await.unwrap();
        let store = Arc::new(CacheStore::new(
            &db,
            blacklist.view(),
            time::Duration::hours(24),
            CacheDriver::Sqlite,
            CacheMethod::Refresh,
        ));
        let queue = JobQueue::new(db.pool().clone());
        let scheduler = Scheduler::new(store.clone(), queue, Duration::from_secs(60));
        (db, store, scheduler)
    }

    #[tokio::test]
    async fn test_pass_enqueues_tracked_and_expired_ids() {
        let (_db, store, scheduler) = fixture().await;
        store.track(7).await.unwrap();
        store.track(9).await.unwrap();
        let summary = scheduler.run_once().await.unwrap();
        assert_eq!(summary, PassSummary { examined: 2, enqueued: 2 });
    }

    #[tokio::test]
    async fn test_repeated_passes_do_not_duplicate_jobs() {
        let (_db, store, scheduler) = fixture().await;
        store.track(7).await.unwrap();
        scheduler.run_once().await.unwrap();
        let second = scheduler.run_once().await.unwrap();
        assert_eq!(second, PassSummary { examined: 1, enqueued: 0 });
    }

    #[tokio::test]
    async fn test_fresh_entries_are_left_alone() {
        let (_db, store, scheduler) = fixture().await;
        let record = Record::from_raw(json!({"mal_id": 42, "title": "Monster"})).unwrap();
        store.put(&record).await.unwrap();
        let summary = scheduler.run_once().await.unwrap();
        assert_eq!(summary, PassSummary { examined: 0, enqueued: 0 });
    }
}
