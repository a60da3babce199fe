//! Shared bootstrap for every subcommand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use exn::ResultExt;
use koyomi_cache::{Blacklist, CacheStore, Database};
use koyomi_config::{Overrides, Settings, default_overrides_path};
use koyomi_index::JobQueue;
use tracing::debug;

use crate::error::{ErrorKind, Result};

/// Everything a command handler needs, built once per invocation.
pub struct App {
    pub settings: Settings,
    pub db: Database,
    pub blacklist: Blacklist,
    pub store: Arc<CacheStore>,
    pub queue: JobQueue,
    pub overrides_path: PathBuf,
}

impl App {
    pub async fn boot(config_file: Option<&Path>) -> Result<Self> {
        let mut settings = Settings::load(config_file).or_raise(|| ErrorKind::Config)?;
        let overrides_path = default_overrides_path().or_raise(|| ErrorKind::Config)?;
        let overrides = Overrides::load(&overrides_path).or_raise(|| ErrorKind::Config)?;
        overrides.apply(&mut settings);

        let db = Database::connect(&settings.database.path).await.or_raise(|| ErrorKind::Cache)?;
        let blacklist = Blacklist::load(&db).await.or_raise(|| ErrorKind::Cache)?;
        let store = Arc::new(CacheStore::new(
            &db,
            blacklist.view(),
            settings.ttl(),
            settings.cache.driver,
            settings.cache.method,
        ));
        let queue = JobQueue::new(db.pool().clone());
        debug!(
            driver = %settings.cache.driver,
            method = %settings.cache.method,
            "application booted"
        );
        Ok(Self { settings, db, blacklist, store, queue, overrides_path })
    }

    pub async fn shutdown(&self) {
        self.db.close().await;
    }
}
