//! Background re-indexing pipeline.
//!
//! Three cooperating pieces keep the cache warm: a durable [`JobQueue`]
//! in the same SQLite database as the cache, a [`Scheduler`] that turns
//! stale entries into queued jobs on a fixed period, and a pool of
//! [`Worker`]s that claim jobs, fetch upstream through the shared rate
//! limiter, and write canonicalized records back to the store. All three
//! survive process restarts because the queue is the only coordination
//! state and it lives on disk.

pub mod backoff;
pub mod error;
mod models;
mod queue;
mod scheduler;
mod worker;

pub use crate::backoff::RetryPolicy;
pub use crate::models::{Job, JobState};
pub use crate::queue::JobQueue;
pub use crate::scheduler::{PassSummary, Scheduler};
pub use crate::worker::{Outcome, Worker};
