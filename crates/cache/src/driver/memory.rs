//! Volatile in-process entry transport.

use async_trait::async_trait;
use std::collections::HashMap;
use time::UtcDateTime;
use tokio::sync::RwLock;

use super::EntryDriver;
use crate::error::Result;
use crate::models::CacheEntry;

/// Entries in a `HashMap` behind an async [`RwLock`].
///
/// Starts empty when swapped in; the scheduler repopulates it on its next
/// passes. Every entry can be rebuilt from the upstream source, so losing
/// them on a driver swap or restart is acceptable. Also handy for tests
/// that don't want a database.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    // None marks a tracked-but-never-indexed placeholder.
    entries: RwLock<HashMap<u64, Option<CacheEntry>>>,
}

#[async_trait]
impl EntryDriver for MemoryDriver {
    async fn get(&self, id: u64) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(&id).cloned().flatten())
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        self.entries.write().await.insert(entry.mal_id, Some(entry.clone()));
        Ok(())
    }

    async fn touch(&self, id: u64, last_indexed_at: UtcDateTime, expires_at: UtcDateTime) -> Result<bool> {
        let mut guard = self.entries.write().await;
        match guard.get_mut(&id).and_then(Option::as_mut) {
            Some(entry) => {
                entry.last_indexed_at = last_indexed_at;
                entry.expires_at = expires_at;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.entries.write().await.remove(&id).is_some())
    }

    async fn track(&self, id: u64) -> Result<()> {
        self.entries.write().await.entry(id).or_insert(None);
        Ok(())
    }

    async fn stale(&self, now: UtcDateTime) -> Result<Vec<u64>> {
        let guard = self.entries.read().await;
        let mut due: Vec<(Option<i64>, u64)> = guard
            .iter()
            .filter_map(|(id, slot)| match slot {
                None => Some((None, *id)),
                Some(entry) if entry.is_expired(now) => Some((Some(entry.expires_at.unix_timestamp()), *id)),
                Some(_) => None,
            })
            .collect();
        // None (never indexed) sorts before every timestamp.
        due.sort();
        Ok(due.into_iter().map(|(_, id)| id).collect())
    }
}
