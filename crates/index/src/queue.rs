//! Durable job queue over the `jobs` table.
//!
//! Every state transition is a compare-and-swap on `(id, state)`, so two
//! workers racing over the same job resolve to exactly one winner and the
//! loser sees `false`. Completion deletes the row outright rather than
//! parking a "done" state, which lets `UNIQUE(mal_id)` enforce that an id
//! carries at most one live job and that a failed job blocks re-enqueue
//! until an operator clears it.

use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;
use tracing::{debug, warn};

use crate::error::{ErrorKind, Result};
use crate::models::{Job, JobRow};

#[derive(Debug, Clone)]
pub struct JobQueue {
    pool: SqlitePool,
}

impl JobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue a refresh job for `id`, immediately claimable. Returns `false`
    /// without touching the row when any job for the id already exists, no
    /// matter its state. `INSERT OR IGNORE` makes this atomic under
    /// concurrent enqueuers.
    pub async fn enqueue(&self, id: u64, now: UtcDateTime) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/enqueue_job.sql"))
            .bind(to_db_id(id)?)
            .bind(now.unix_timestamp())
            .bind(now.unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Claim the most overdue pending job that is due at `now`, flipping it
    /// to inflight in the same statement. Ties on `next_attempt_at` break on
    /// `mal_id` so the claim order is deterministic.
    pub async fn claim(&self, now: UtcDateTime) -> Result<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as(include_str!("../queries/claim_job.sql"))
            .bind(now.unix_timestamp())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => Ok(Some(Job::try_from(row)?)),
            None => Ok(None),
        }
    }

    /// Delete an inflight job after a successful refresh. Returns `false`
    /// when the job was cancelled out from under the worker, in which case
    /// the caller must not write back.
    pub async fn complete(&self, job_id: i64) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/complete_job.sql"))
            .bind(job_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Return an inflight job to pending with an updated attempt count and a
    /// deadline before which it may not be claimed again.
    pub async fn retry(
        &self,
        job_id: i64,
        attempts: u32,
        next_attempt_at: UtcDateTime,
        last_error: &str,
    ) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/retry_job.sql"))
            .bind(i64::from(attempts))
            .bind(next_attempt_at.unix_timestamp())
            .bind(last_error)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Park an inflight job as failed. Failed jobs are never claimed and
    /// block re-enqueue of the same id until cleared.
    pub async fn fail(&self, job_id: i64, attempts: u32, last_error: &str) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/fail_job.sql"))
            .bind(i64::from(attempts))
            .bind(last_error)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop every pending and failed job. Inflight jobs are left alone; their
    /// workers resolve them through the usual CAS and lose quietly if the row
    /// is already gone.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/clear_jobs.sql"))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let cleared = result.rows_affected();
        debug!(cleared, "cleared resolvable jobs");
        Ok(cleared)
    }

    /// Return every inflight job to pending, immediately claimable.
    ///
    /// Boot-time recovery: a worker interrupted mid-job (crash, shutdown
    /// racing a claim) leaves its row inflight, and nothing else ever
    /// touches inflight rows. Without this reset the id would be wedged:
    /// unclaimable, blocked from re-enqueue by the uniqueness constraint,
    /// and spared by [`clear`](Self::clear).
    pub async fn recover(&self) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/recover_jobs.sql"))
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let recovered = result.rows_affected();
        if recovered > 0 {
            warn!(recovered, "reset orphaned inflight jobs to pending");
        }
        Ok(recovered)
    }

    /// Look up the job for an id, if any.
    pub async fn find(&self, id: u64) -> Result<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as(include_str!("../queries/get_job.sql"))
            .bind(to_db_id(id)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => Ok(Some(Job::try_from(row)?)),
            None => Ok(None),
        }
    }
}

fn to_db_id(id: u64) -> Result<i64> {
    i64::try_from(id).or_raise(|| ErrorKind::Database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobState;
    use koyomi_cache::Database;

    async fn queue() -> (Database, JobQueue) {
        let db = Database::connect_in_memory().await.unwrap();
        let queue = JobQueue::new(db.pool().clone());
        (db, queue)
    }

    #[tokio::test]
    async fn test_enqueue_is_idempotent() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        assert!(queue.enqueue(42, now).await.unwrap());
        assert!(!queue.enqueue(42, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_flips_to_inflight_and_orders_by_due_date() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        queue.enqueue(9, now - time::Duration::hours(1)).await.unwrap();
        queue.enqueue(5, now - time::Duration::hours(2)).await.unwrap();
        let first = queue.claim(now).await.unwrap().unwrap();
        assert_eq!(first.mal_id, 5);
        assert_eq!(first.state, JobState::InFlight);
        let second = queue.claim(now).await.unwrap().unwrap();
        assert_eq!(second.mal_id, 9);
        assert!(queue.claim(now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backdated_jobs_are_not_claimable_yet() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        queue.enqueue(42, now + time::Duration::hours(1)).await.unwrap();
        assert!(queue.claim(now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_frees_the_id_for_re_enqueue() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        queue.enqueue(42, now).await.unwrap();
        let job = queue.claim(now).await.unwrap().unwrap();
        assert!(queue.complete(job.id).await.unwrap());
        assert!(queue.find(42).await.unwrap().is_none());
        assert!(queue.enqueue(42, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_complete_cas_loses_after_cancellation() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        queue.enqueue(42, now).await.unwrap();
        let job = queue.claim(now).await.unwrap().unwrap();
        // An operator purges the id while the fetch is in flight.
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(job.id)
            .execute(&queue.pool)
            .await
            .unwrap();
        assert!(!queue.complete(job.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_defers_the_next_claim() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        queue.enqueue(42, now).await.unwrap();
        let job = queue.claim(now).await.unwrap().unwrap();
        let later = now + time::Duration::minutes(5);
        assert!(queue.retry(job.id, 1, later, "upstream returned 503").await.unwrap());
        assert!(queue.claim(now).await.unwrap().is_none());
        let retried = queue.claim(later).await.unwrap().unwrap();
        assert_eq!(retried.attempts, 1);
        assert_eq!(retried.last_error.as_deref(), Some("upstream returned 503"));
    }

    #[tokio::test]
    async fn test_failed_job_blocks_re_enqueue_until_cleared() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        queue.enqueue(42, now).await.unwrap();
        let job = queue.claim(now).await.unwrap().unwrap();
        assert!(queue.fail(job.id, 5, "upstream payload was not an object").await.unwrap());
        assert!(!queue.enqueue(42, now).await.unwrap());
        assert!(queue.claim(now).await.unwrap().is_none());
        assert_eq!(queue.clear().await.unwrap(), 1);
        assert!(queue.enqueue(42, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_recover_reclaims_orphaned_inflight_jobs() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        queue.enqueue(42, now).await.unwrap();
        let orphan = queue.claim(now).await.unwrap().unwrap();
        // A worker interrupted here leaves its claim behind. The row is
        // unclaimable no matter how much time passes, blocks re-enqueue,
        // and clear spares it.
        assert!(queue.claim(now + time::Duration::days(30)).await.unwrap().is_none());
        assert!(!queue.enqueue(42, now).await.unwrap());
        assert_eq!(queue.clear().await.unwrap(), 0);
        assert_eq!(queue.find(42).await.unwrap().unwrap().state, JobState::InFlight);

        // Recovery resets it to pending with its attempt count intact.
        assert_eq!(queue.recover().await.unwrap(), 1);
        let job = queue.claim(UtcDateTime::now()).await.unwrap().unwrap();
        assert_eq!(job.id, orphan.id);
        assert_eq!(job.attempts, orphan.attempts);
    }

    #[tokio::test]
    async fn test_recover_leaves_pending_and_failed_jobs_alone() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        queue.enqueue(1, now).await.unwrap();
        queue.enqueue(2, now).await.unwrap();
        let job = queue.claim(now).await.unwrap().unwrap();
        queue.fail(job.id, 5, "upstream payload was not an object").await.unwrap();
        assert_eq!(queue.recover().await.unwrap(), 0);
        assert_eq!(queue.find(job.mal_id).await.unwrap().unwrap().state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_clear_spares_inflight_jobs() {
        let (_db, queue) = queue().await;
        let now = UtcDateTime::now();
        queue.enqueue(1, now).await.unwrap();
        queue.enqueue(2, now).await.unwrap();
        let inflight = queue.claim(now).await.unwrap().unwrap();
        assert_eq!(queue.clear().await.unwrap(), 1);
        assert_eq!(
            queue.find(inflight.mal_id).await.unwrap().unwrap().state,
            JobState::InFlight,
        );
        // The surviving job still resolves normally.
        assert!(queue.complete(inflight.id).await.unwrap());
    }
}
