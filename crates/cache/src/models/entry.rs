use exn::ResultExt;
use serde_json::Value;
use time::UtcDateTime;

use crate::error::{Error, ErrorKind};

/// A materialized cache entry: a record that has been fetched successfully
/// at least once.
///
/// `expires_at` is always derived from `last_indexed_at` plus the configured
/// TTL in the same write; the two never drift independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Stable external key.
    pub mal_id: u64,
    /// Canonical payload as written by the refresh worker.
    pub payload: Value,
    /// blake3 hex digest of the canonical payload.
    pub fingerprint: String,
    /// When the record was last written or confirmed unchanged.
    pub last_indexed_at: UtcDateTime,
    /// Freshness horizon; entries past it are served flagged as stale.
    pub expires_at: UtcDateTime,
}

impl CacheEntry {
    pub fn is_expired(&self, now: UtcDateTime) -> bool {
        self.expires_at <= now
    }
}

/// Raw `entries` row. Placeholder rows (everything but `mal_id` NULL) are
/// tracked-but-never-indexed ids; only the scheduler cares about those, so
/// the conversion to [`CacheEntry`] is partial.
#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub(crate) mal_id: i64,
    pub(crate) payload: Option<String>,
    pub(crate) fingerprint: Option<String>,
    pub(crate) expires_at: Option<i64>,
    pub(crate) last_indexed_at: Option<i64>,
}

impl EntryRow {
    /// Convert a row into a materialized entry, or `None` for placeholders.
    pub(crate) fn into_entry(self) -> Result<Option<CacheEntry>, Error> {
        let (Some(payload), Some(fingerprint), Some(expires_at), Some(last_indexed_at)) =
            (self.payload, self.fingerprint, self.expires_at, self.last_indexed_at)
        else {
            return Ok(None);
        };
        Ok(Some(CacheEntry {
            mal_id: u64::try_from(self.mal_id).or_raise(|| ErrorKind::InvalidData("mal id"))?,
            payload: serde_json::from_str(&payload).or_raise(|| ErrorKind::InvalidData("payload"))?,
            fingerprint,
            last_indexed_at: UtcDateTime::from_unix_timestamp(last_indexed_at)
                .or_raise(|| ErrorKind::InvalidData("last indexed date"))?,
            expires_at: UtcDateTime::from_unix_timestamp(expires_at)
                .or_raise(|| ErrorKind::InvalidData("expiry date"))?,
        }))
    }
}

impl TryFrom<&CacheEntry> for EntryRow {
    type Error = Error;
    fn try_from(entry: &CacheEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            mal_id: i64::try_from(entry.mal_id).or_raise(|| ErrorKind::InvalidData("mal id"))?,
            payload: Some(
                serde_json::to_string(&entry.payload).or_raise(|| ErrorKind::InvalidData("payload"))?,
            ),
            fingerprint: Some(entry.fingerprint.clone()),
            expires_at: Some(entry.expires_at.unix_timestamp()),
            last_indexed_at: Some(entry.last_indexed_at.unix_timestamp()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_to_model() {
        let now = UtcDateTime::now();
        let row = EntryRow {
            mal_id: 42,
            payload: Some(r#"{"mal_id":42,"title":"Cowboy Bebop"}"#.to_string()),
            fingerprint: Some("abc123".to_string()),
            expires_at: Some(now.unix_timestamp() + 86_400),
            last_indexed_at: Some(now.unix_timestamp()),
        };
        let entry = row.into_entry().unwrap().unwrap();
        assert_eq!(entry.mal_id, 42);
        assert_eq!(entry.payload["title"], json!("Cowboy Bebop"));
        assert!(!entry.is_expired(now));
    }

    #[test]
    fn test_placeholder_row_is_not_an_entry() {
        let row = EntryRow {
            mal_id: 42,
            payload: None,
            fingerprint: None,
            expires_at: None,
            last_indexed_at: None,
        };
        assert!(row.into_entry().unwrap().is_none());
    }

    #[test]
    fn test_model_to_row() {
        let now = UtcDateTime::now();
        let entry = CacheEntry {
            mal_id: 42,
            payload: json!({"mal_id": 42}),
            fingerprint: "abc123".to_string(),
            last_indexed_at: now,
            expires_at: now,
        };
        let row = EntryRow::try_from(&entry).unwrap();
        assert_eq!(row.mal_id, 42);
        assert_eq!(row.last_indexed_at, Some(now.unix_timestamp()));
    }
}
