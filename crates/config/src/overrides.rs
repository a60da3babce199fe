//! Operator overrides that outlive the process.
//!
//! `cache:driver` and `cache:method` change the running service through the
//! store, but a change that evaporates on restart is an operational trap, so
//! the CLI also writes the choice here. Overrides sit above every other
//! configuration source.

use std::path::{Path, PathBuf};

use exn::ResultExt;
use koyomi_cache::{CacheDriver, CacheMethod};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorKind, Result};
use crate::settings::Settings;

pub const OVERRIDES_FILE: &str = "overrides.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    pub driver: Option<CacheDriver>,
    pub method: Option<CacheMethod>,
}

impl Overrides {
    /// Read the overrides file; absence means no overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(error) => Err(error).or_raise(|| ErrorKind::Load)?,
        };
        toml::from_str(&text).or_raise(|| ErrorKind::Load)
    }

    /// Write the overrides file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Persist)?;
        }
        let text = toml::to_string_pretty(self).or_raise(|| ErrorKind::Persist)?;
        std::fs::write(path, text).or_raise(|| ErrorKind::Persist)?;
        debug!(path = %path.display(), "persisted runtime overrides");
        Ok(())
    }

    /// Fold the overrides into loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(driver) = self.driver {
            settings.cache.driver = driver;
        }
        if let Some(method) = self.method {
            settings.cache.method = method;
        }
    }
}

/// Where the overrides file lives by default.
pub fn default_overrides_path() -> Result<PathBuf> {
    Ok(crate::settings::default_data_dir()?.join(OVERRIDES_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_file_means_no_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Overrides::load(&dir.path().join(OVERRIDES_FILE)).unwrap();
        assert_eq!(loaded, Overrides::default());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(OVERRIDES_FILE);
        let overrides = Overrides { driver: Some(CacheDriver::Memory), method: None };
        overrides.save(&path).unwrap();
        assert_eq!(Overrides::load(&path).unwrap(), overrides);
    }

    #[test]
    fn test_apply_touches_only_set_fields() {
        let mut settings = Settings::default();
        let overrides = Overrides { driver: None, method: Some(CacheMethod::Bypass) };
        overrides.apply(&mut settings);
        assert_eq!(settings.cache.driver, CacheDriver::Sqlite);
        assert_eq!(settings.cache.method, CacheMethod::Bypass);
    }

    #[test]
    fn test_garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OVERRIDES_FILE);
        std::fs::write(&path, "driver = 42").unwrap();
        assert!(Overrides::load(&path).is_err());
    }
}
