//! Subcommand handlers.
//!
//! Every handler maps its outcome onto the exit code contract: 0 for
//! success, 1 for an unknown id or an unavailable backend, 2 for invalid
//! operator input (rejected before any mutation).

mod blacklist;
mod cache;
mod indexing;
mod jobs;
mod serve;

use std::process::ExitCode;

use crate::app::App;
use crate::args::Command;
use crate::error::Result;

pub async fn dispatch(app: App, command: Command) -> Result<ExitCode> {
    // Serve owns the app for its whole run and closes it on shutdown.
    if let Command::Serve = command {
        return serve::run(app).await;
    }
    let code = match command {
        Command::CacheRemove { mal_id } => cache::remove(&app, mal_id).await?,
        Command::CacheShow { mal_id } => cache::show(&app, mal_id).await?,
        Command::CacheDriver { name } => cache::driver(&app, &name).await?,
        Command::CacheMethod { name } => cache::method(&app, &name).await?,
        Command::JobsClear => jobs::clear(&app).await?,
        Command::BlacklistAdd { mal_id, reason } => {
            blacklist::add(&app, mal_id, reason.as_deref()).await?
        }
        Command::BlacklistRemove { mal_id } => blacklist::remove(&app, mal_id).await?,
        Command::BlacklistFlush => blacklist::flush(&app).await?,
        Command::IndexingStart => indexing::start(&app).await?,
        Command::IndexingSeed { mal_ids } => indexing::seed(&app, &mal_ids).await?,
        Command::Serve => unreachable!("handled above"),
    };
    app.shutdown().await;
    Ok(code)
}
