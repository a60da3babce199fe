//! The fixed enumerations behind the runtime cache switch.
//!
//! The operator-facing `cache:driver` / `cache:method` commands accept only
//! these names; anything else is rejected before any mutation happens.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// Storage transport for cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    /// Durable entries in the SQLite database (default).
    Sqlite,
    /// Volatile in-process map; starts empty on swap and is repopulated by
    /// re-indexing.
    Memory,
}

impl CacheDriver {
    pub const ALL: &[Self] = &[Self::Sqlite, Self::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for CacheDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheDriver {
    type Err = Error;
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(Error::from(ErrorKind::UnknownDriver(other.to_string()))),
        }
    }
}

/// Read strategy applied when classifying a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMethod {
    /// Normal read-through: expired entries are served flagged stale (default).
    Refresh,
    /// Serve whatever is stored without freshness classification. Useful to
    /// quiesce staleness signaling during a prolonged upstream outage.
    Bypass,
}

impl CacheMethod {
    pub const ALL: &[Self] = &[Self::Refresh, Self::Bypass];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Bypass => "bypass",
        }
    }
}

impl fmt::Display for CacheMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheMethod {
    type Err = Error;
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "refresh" => Ok(Self::Refresh),
            "bypass" => Ok(Self::Bypass),
            other => Err(Error::from(ErrorKind::UnknownMethod(other.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sqlite", CacheDriver::Sqlite)]
    #[case("memory", CacheDriver::Memory)]
    fn test_driver_names_round_trip(#[case] name: &str, #[case] driver: CacheDriver) {
        assert_eq!(name.parse::<CacheDriver>().unwrap(), driver);
        assert_eq!(driver.to_string(), name);
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        assert!(matches!(*"bogus".parse::<CacheDriver>().unwrap_err(), ErrorKind::UnknownDriver(_)));
        assert!(matches!(*"bogus".parse::<CacheMethod>().unwrap_err(), ErrorKind::UnknownMethod(_)));
    }
}
