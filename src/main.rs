//! koyomi: read-through cache and background re-indexer for scraped anime
//! metadata.

mod app;
mod args;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::args::Cli;
use crate::error::Error;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = match App::boot(cli.config.as_deref()).await {
        Ok(app) => app,
        Err(cause) => return report(&cause),
    };
    match commands::dispatch(app, cli.command).await {
        Ok(code) => code,
        Err(cause) => report(&cause),
    }
}

fn report(error: &Error) -> ExitCode {
    eprintln!("error: {error}");
    let mut source = std::error::Error::source(error.frame());
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    ExitCode::FAILURE
}
