use exn::ResultExt;
use time::UtcDateTime;

use crate::error::{Error, ErrorKind};

/// One excluded id.
///
/// Presence alone is what matters: a blacklisted id is invisible to reads
/// and to scheduler selection. The reason is operator-facing bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistEntry {
    pub mal_id: u64,
    pub reason: String,
    pub added_at: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct BlacklistRow {
    pub(crate) mal_id: i64,
    pub(crate) reason: String,
    pub(crate) added_at: i64,
}

impl TryFrom<BlacklistRow> for BlacklistEntry {
    type Error = Error;
    fn try_from(row: BlacklistRow) -> Result<Self, Self::Error> {
        Ok(Self {
            mal_id: u64::try_from(row.mal_id).or_raise(|| ErrorKind::InvalidData("mal id"))?,
            reason: row.reason,
            added_at: UtcDateTime::from_unix_timestamp(row.added_at)
                .or_raise(|| ErrorKind::InvalidData("added date"))?,
        })
    }
}
