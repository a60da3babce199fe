//! The long-running service: one scheduler plus a pool of refresh workers,
//! all sharing the process-wide rate limiter and a single shutdown signal.

use std::process::ExitCode;
use std::sync::Arc;

use exn::ResultExt;
use koyomi_fetch::{FetcherHandle, HttpFetcher, Limiter};
use koyomi_index::{RetryPolicy, Scheduler, Worker};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::app::App;
use crate::error::{ErrorKind, Result};

pub async fn run(app: App) -> Result<ExitCode> {
    let fetcher: FetcherHandle = Arc::new(
        HttpFetcher::new(&app.settings.fetch.base_url, app.settings.fetch_timeout())
            .or_raise(|| ErrorKind::Fetch)?,
    );
    let limiter = Arc::new(Limiter::new(app.settings.fetch_interval()));
    let policy = RetryPolicy {
        max_attempts: app.settings.index.max_attempts,
        base_delay: std::time::Duration::from_secs(app.settings.index.base_delay_secs),
        max_delay: std::time::Duration::from_secs(app.settings.index.max_delay_secs),
    };

    // Jobs claimed by a previous run that never finished are still marked
    // inflight. Hand them back to the scheduler before spawning workers.
    app.queue.recover().await.or_raise(|| ErrorKind::Index)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    let scheduler =
        Scheduler::new(app.store.clone(), app.queue.clone(), app.settings.scheduler_period());
    let rx = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move { scheduler.run(rx).await }));

    for n in 0..app.settings.index.workers {
        let worker = Worker::new(
            app.queue.clone(),
            app.store.clone(),
            fetcher.clone(),
            limiter.clone(),
            policy,
            app.settings.idle_delay(),
        );
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            info!(worker = n, "refresh worker started");
            worker.run(rx).await;
        }));
    }
    info!(workers = app.settings.index.workers, "serving");

    if let Err(cause) = tokio::signal::ctrl_c().await {
        warn!(%cause, "could not listen for interrupts, shutting down");
    }
    info!("interrupt received, draining");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }
    app.shutdown().await;
    Ok(ExitCode::SUCCESS)
}
