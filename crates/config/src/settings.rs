use std::path::{Path, PathBuf};
use std::time::Duration;

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use koyomi_cache::{CacheDriver, CacheMethod};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorKind, Result};

/// Fully resolved application settings.
///
/// Sources, weakest first: built-in defaults, the TOML config file, then
/// `KOYOMI_`-prefixed environment variables (`KOYOMI_CACHE__TTL_HOURS` and
/// friends, sections split on `__`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub index: IndexSettings,
    pub fetch: FetchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    /// SQLite file holding entries, blacklist and jobs alike.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub driver: CacheDriver,
    pub method: CacheMethod,
    /// Freshness horizon applied on every write.
    pub ttl_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexSettings {
    /// Seconds between scheduling passes.
    pub period_secs: u64,
    /// Refresh workers to run concurrently.
    pub workers: u32,
    /// Fetch attempts before a job is parked as failed.
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    /// Worker sleep when the queue is empty.
    pub idle_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Minimum spacing between upstream requests, shared by all workers.
    pub min_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            cache: CacheSettings::default(),
            index: IndexSettings::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: PathBuf::from("koyomi.sqlite") }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            driver: CacheDriver::Sqlite,
            method: CacheMethod::Refresh,
            ttl_hours: 24,
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            period_secs: 86_400,
            workers: 2,
            max_attempts: 5,
            base_delay_secs: 30,
            max_delay_secs: 3_600,
            idle_delay_ms: 500,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://myanimelist.net".to_string(),
            timeout_secs: 30,
            min_interval_ms: 4_000,
        }
    }
}

impl Settings {
    /// Load settings from an explicit config file, or from the platform
    /// config directory when none is given. A missing file is fine; the
    /// defaults and environment still apply.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let path = match config_file {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        debug!(path = %path.display(), "loading configuration");
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(&path))
            // KOYOMI_CONFIG names the file itself and is consumed by the
            // CLI, not by the settings tree.
            .merge(Env::prefixed("KOYOMI_").split("__").ignore(&["config"]))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.cache.ttl_hours == 0 {
            exn::bail!(ErrorKind::Invalid("cache.ttl_hours must be at least 1".to_string()));
        }
        if self.index.workers == 0 {
            exn::bail!(ErrorKind::Invalid("index.workers must be at least 1".to_string()));
        }
        if self.index.max_attempts == 0 {
            exn::bail!(ErrorKind::Invalid("index.max_attempts must be at least 1".to_string()));
        }
        if self.index.base_delay_secs > self.index.max_delay_secs {
            exn::bail!(ErrorKind::Invalid(
                "index.base_delay_secs must not exceed index.max_delay_secs".to_string(),
            ));
        }
        if self.fetch.base_url.is_empty() {
            exn::bail!(ErrorKind::Invalid("fetch.base_url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn ttl(&self) -> time::Duration {
        time::Duration::hours(self.cache.ttl_hours as i64)
    }

    pub fn scheduler_period(&self) -> Duration {
        Duration::from_secs(self.index.period_secs)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.index.idle_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_millis(self.fetch.min_interval_ms)
    }
}

/// `$XDG_CONFIG_HOME/koyomi/config.toml` or the platform equivalent.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "koyomi")
        .ok_or_else(|| exn::Exn::from(ErrorKind::ProjectDirs))?;
    Ok(dirs.config_dir().join("config.toml"))
}

/// `$XDG_DATA_HOME/koyomi` or the platform equivalent.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "koyomi")
        .ok_or_else(|| exn::Exn::from(ErrorKind::ProjectDirs))?;
    Ok(dirs.data_dir().to_path_buf())
}
