//! Configuration for the koyomi service.
//!
//! Layered loading (defaults, TOML file, `KOYOMI_` environment) plus a
//! small persisted overrides file for the settings operators can flip at
//! runtime.

pub mod error;
mod overrides;
mod settings;

pub use crate::overrides::{Overrides, default_overrides_path};
pub use crate::settings::{
    CacheSettings, DatabaseSettings, FetchSettings, IndexSettings, Settings, default_config_path,
    default_data_dir,
};
