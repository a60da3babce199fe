use std::process::ExitCode;

use exn::ResultExt;
use koyomi_cache::{CacheDriver, CacheMethod, Lookup};
use koyomi_config::Overrides;
use koyomi_record::Record;
use serde_json::json;

use crate::app::App;
use crate::error::{ErrorKind, Result};

pub async fn remove(app: &App, mal_id: u64) -> Result<ExitCode> {
    if app.store.purge(mal_id).await.or_raise(|| ErrorKind::Cache)? {
        println!("removed cache entry {mal_id}");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("no cache entry for id {mal_id}");
        Ok(ExitCode::from(1))
    }
}

pub async fn show(app: &App, mal_id: u64) -> Result<ExitCode> {
    let lookup = app.store.get(mal_id).await.or_raise(|| ErrorKind::Cache)?;
    let Some(entry) = lookup.entry() else {
        eprintln!("no cache entry for id {mal_id}");
        return Ok(ExitCode::from(1));
    };
    let record = Record::from_raw(entry.payload.clone()).or_raise(|| ErrorKind::Cache)?;
    let output = json!({
        "data": entry.payload.clone(),
        "derived": koyomi_record::transforms::derived(&record),
        "stale": matches!(lookup, Lookup::Stale(_)),
        "fingerprint": entry.fingerprint.clone(),
    });
    let rendered = serde_json::to_string_pretty(&output).or_raise(|| ErrorKind::Cache)?;
    println!("{rendered}");
    Ok(ExitCode::SUCCESS)
}

pub async fn driver(app: &App, name: &str) -> Result<ExitCode> {
    let Ok(driver) = name.parse::<CacheDriver>() else {
        eprintln!("unknown cache driver {name:?} (expected one of: {})", names(CacheDriver::ALL));
        return Ok(ExitCode::from(2));
    };
    app.store.set_driver(driver).await.or_raise(|| ErrorKind::Cache)?;
    persist(app, |overrides| overrides.driver = Some(driver))?;
    println!("cache driver set to {driver}");
    Ok(ExitCode::SUCCESS)
}

pub async fn method(app: &App, name: &str) -> Result<ExitCode> {
    let Ok(method) = name.parse::<CacheMethod>() else {
        eprintln!("unknown cache method {name:?} (expected one of: {})", names(CacheMethod::ALL));
        return Ok(ExitCode::from(2));
    };
    app.store.set_method(method).await.or_raise(|| ErrorKind::Cache)?;
    persist(app, |overrides| overrides.method = Some(method))?;
    println!("cache method set to {method}");
    Ok(ExitCode::SUCCESS)
}

// The swap must outlive this process, so it lands in the overrides file
// next to whatever the other command already persisted.
fn persist(app: &App, update: impl FnOnce(&mut Overrides)) -> Result<()> {
    let mut overrides = Overrides::load(&app.overrides_path).or_raise(|| ErrorKind::Config)?;
    update(&mut overrides);
    overrides.save(&app.overrides_path).or_raise(|| ErrorKind::Config)
}

fn names<T: std::fmt::Display>(all: &[T]) -> String {
    all.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
