//! Refresh worker: claims queued jobs, fetches upstream, writes back.

use std::sync::Arc;
use std::time::Duration;

use exn::ResultExt;
use koyomi_cache::CacheStore;
use koyomi_fetch::{FetcherHandle, Limiter};
use koyomi_record::Record;
use time::UtcDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::backoff::RetryPolicy;
use crate::error::{ErrorKind, Result};
use crate::models::Job;
use crate::queue::JobQueue;

/// How a single job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Fetched, written back, job deleted.
    Completed { mal_id: u64, put: koyomi_cache::PutOutcome },
    /// The job vanished mid-flight (purge, clear); the fetched data was
    /// discarded without touching the store.
    Abandoned { mal_id: u64 },
    /// Transient failure; the job went back to pending with a deadline.
    Retrying { mal_id: u64, attempts: u32 },
    /// Terminal failure or retry budget exhausted; the job is parked.
    Failed { mal_id: u64 },
}

pub struct Worker {
    queue: JobQueue,
    store: Arc<CacheStore>,
    fetcher: FetcherHandle,
    limiter: Arc<Limiter>,
    policy: RetryPolicy,
    /// How long to sleep when the queue comes up empty.
    idle_delay: Duration,
}

impl Worker {
    pub fn new(
        queue: JobQueue,
        store: Arc<CacheStore>,
        fetcher: FetcherHandle,
        limiter: Arc<Limiter>,
        policy: RetryPolicy,
        idle_delay: Duration,
    ) -> Self {
        Self { queue, store, fetcher, limiter, policy, idle_delay }
    }

    /// Claim and process at most one job. `Ok(None)` means nothing was due.
    pub async fn run_once(&self) -> Result<Option<Outcome>> {
        match self.queue.claim(UtcDateTime::now()).await? {
            Some(job) => Ok(Some(self.process(job).await?)),
            None => Ok(None),
        }
    }

    /// Process jobs until shutdown. Job-level failures are recorded on the
    /// job itself; only infrastructure errors surface here, and those are
    /// logged rather than allowed to kill the worker.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                outcome = self.run_once() => {
                    match outcome {
                        Ok(Some(_)) => {}
                        Ok(None) => tokio::time::sleep(self.idle_delay).await,
                        Err(error) => {
                            error!(%error, "worker pass failed");
                            tokio::time::sleep(self.idle_delay).await;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("worker shutting down");
                    return;
                }
            }
        }
    }

    #[instrument(skip(self, job), fields(mal_id = job.mal_id, attempts = job.attempts))]
    async fn process(&self, job: Job) -> Result<Outcome> {
        self.limiter.acquire().await;
        let raw = match self.fetcher.fetch(job.mal_id).await {
            Ok(raw) => raw,
            Err(error) => return self.resolve_fetch_failure(job, &error).await,
        };

        let record = match Record::from_raw(raw) {
            Ok(record) if record.id() == job.mal_id => record,
            Ok(record) => {
                let reason =
                    format!("upstream answered id {} for id {}", record.id(), job.mal_id);
                return self.park(job, &reason).await;
            }
            // Canonicalization failures are terminal; retrying the same
            // payload cannot succeed.
            Err(error) => return self.park(job, &error.to_string()).await,
        };

        // Resolve the job before writing back. Losing this CAS means the
        // job was cancelled while the fetch ran, and cancellation wins.
        if !self.queue.complete(job.id).await? {
            debug!("job cancelled mid-flight, discarding fetched record");
            return Ok(Outcome::Abandoned { mal_id: job.mal_id });
        }
        let put = self.store.put(&record).await.or_raise(|| ErrorKind::Store)?;
        info!(?put, "record refreshed");
        Ok(Outcome::Completed { mal_id: job.mal_id, put })
    }

    async fn resolve_fetch_failure(
        &self,
        job: Job,
        error: &koyomi_fetch::error::Error,
    ) -> Result<Outcome> {
        let attempts = job.attempts + 1;
        if error.is_retryable() && !self.policy.exhausted(attempts) {
            let due = UtcDateTime::now() + self.policy.delay(attempts);
            self.queue.retry(job.id, attempts, due, &error.to_string()).await?;
            warn!(attempts, %error, "transient fetch failure, retrying later");
            Ok(Outcome::Retrying { mal_id: job.mal_id, attempts })
        } else {
            self.park_with_attempts(job, attempts, &error.to_string()).await
        }
    }

    async fn park(&self, job: Job, reason: &str) -> Result<Outcome> {
        let attempts = job.attempts + 1;
        self.park_with_attempts(job, attempts, reason).await
    }

    async fn park_with_attempts(&self, job: Job, attempts: u32, reason: &str) -> Result<Outcome> {
        self.queue.fail(job.id, attempts, reason).await?;
        warn!(attempts, reason, "job parked as failed");
        Ok(Outcome::Failed { mal_id: job.mal_id })
    }
}
