use std::process::ExitCode;

use exn::ResultExt;
use koyomi_index::Scheduler;
use tracing::error;

use crate::app::App;
use crate::error::{ErrorKind, Result};

pub async fn start(app: &App) -> Result<ExitCode> {
    let scheduler =
        Scheduler::new(app.store.clone(), app.queue.clone(), app.settings.scheduler_period());
    match scheduler.run_once().await {
        Ok(summary) => {
            println!("examined {} stale ids, enqueued {} jobs", summary.examined, summary.enqueued);
            Ok(ExitCode::SUCCESS)
        }
        Err(cause) => {
            error!(%cause, "scheduling pass failed");
            Ok(ExitCode::from(1))
        }
    }
}

pub async fn seed(app: &App, mal_ids: &[u64]) -> Result<ExitCode> {
    for mal_id in mal_ids {
        app.store.track(*mal_id).await.or_raise(|| ErrorKind::Cache)?;
    }
    println!("tracking {} ids for indexing", mal_ids.len());
    Ok(ExitCode::SUCCESS)
}
