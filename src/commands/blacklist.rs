use std::process::ExitCode;

use exn::ResultExt;

use crate::app::App;
use crate::error::{ErrorKind, Result};

pub async fn add(app: &App, mal_id: u64, reason: Option<&str>) -> Result<ExitCode> {
    app.blacklist
        .add(mal_id, reason.unwrap_or("added via cli"))
        .await
        .or_raise(|| ErrorKind::Cache)?;
    println!("blacklisted id {mal_id}");
    Ok(ExitCode::SUCCESS)
}

pub async fn remove(app: &App, mal_id: u64) -> Result<ExitCode> {
    let existed = app.blacklist.remove(mal_id).await.or_raise(|| ErrorKind::Cache)?;
    if existed {
        println!("removed id {mal_id} from the blacklist");
    } else {
        println!("id {mal_id} was not blacklisted");
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn flush(app: &App) -> Result<ExitCode> {
    let flushed = app.blacklist.flush().await.or_raise(|| ErrorKind::Cache)?;
    println!("removed {flushed} blacklist entries");
    Ok(ExitCode::SUCCESS)
}
