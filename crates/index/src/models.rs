use std::fmt;
use std::str::FromStr;

use exn::ResultExt;
use time::UtcDateTime;

use crate::error::{Error, ErrorKind, Result};

/// Lifecycle of a queued refresh job.
///
/// There is no terminal "done" state on disk: completion deletes the row, so
/// the `UNIQUE(mal_id)` constraint doubles as the one-active-job-per-id and
/// failed-blocks-re-enqueue guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    InFlight,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::InFlight => "inflight",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = ();
    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "pending" => Ok(JobState::Pending),
            "inflight" => Ok(JobState::InFlight),
            "failed" => Ok(JobState::Failed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Row id, the CAS handle for every state transition.
    pub id: i64,
    pub mal_id: u64,
    pub state: JobState,
    /// Completed fetch attempts so far (not counting the one about to run).
    pub attempts: u32,
    /// Earliest time the job may be claimed.
    pub next_attempt_at: UtcDateTime,
    pub created_at: UtcDateTime,
    pub last_error: Option<String>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct JobRow {
    pub(crate) id: i64,
    pub(crate) mal_id: i64,
    pub(crate) state: String,
    pub(crate) attempts: i64,
    pub(crate) next_attempt_at: i64,
    pub(crate) created_at: i64,
    pub(crate) last_error: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = Error;
    fn try_from(row: JobRow) -> Result<Self> {
        let state = row
            .state
            .parse::<JobState>()
            .map_err(|()| Error::from(ErrorKind::InvalidState(row.id)))?;
        Ok(Self {
            id: row.id,
            mal_id: u64::try_from(row.mal_id).or_raise(|| ErrorKind::InvalidState(row.id))?,
            state,
            attempts: u32::try_from(row.attempts).or_raise(|| ErrorKind::InvalidState(row.id))?,
            next_attempt_at: UtcDateTime::from_unix_timestamp(row.next_attempt_at)
                .or_raise(|| ErrorKind::InvalidState(row.id))?,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidState(row.id))?,
            last_error: row.last_error,
        })
    }
}
