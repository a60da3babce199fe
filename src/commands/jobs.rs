use std::process::ExitCode;

use exn::ResultExt;

use crate::app::App;
use crate::error::{ErrorKind, Result};

pub async fn clear(app: &App) -> Result<ExitCode> {
    let cleared = app.queue.clear().await.or_raise(|| ErrorKind::Index)?;
    println!("cleared {cleared} jobs");
    Ok(ExitCode::SUCCESS)
}
