//! Command-line surface for the `koyomi` binary.
//!
//! Command names keep the `area:action` convention operators already know
//! from the service this replaced.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "koyomi", version, about = "Read-through cache and re-indexer for scraped anime metadata", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "KOYOMI_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Purge a cache entry
    #[command(name = "cache:remove")]
    CacheRemove { mal_id: u64 },

    /// Print a cache entry with its derived display fields
    #[command(name = "cache:show")]
    CacheShow { mal_id: u64 },

    /// Switch the cache storage driver (sqlite, memory)
    #[command(name = "cache:driver")]
    CacheDriver { name: String },

    /// Switch the cache read method (refresh, bypass)
    #[command(name = "cache:method")]
    CacheMethod { name: String },

    /// Drop all pending and failed jobs
    #[command(name = "jobs:clear")]
    JobsClear,

    /// Blacklist an id
    #[command(name = "blacklist:add")]
    BlacklistAdd {
        mal_id: u64,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Remove an id from the blacklist
    #[command(name = "blacklist:remove")]
    BlacklistRemove { mal_id: u64 },

    /// Empty the blacklist
    #[command(name = "blacklist:flush")]
    BlacklistFlush,

    /// Run one scheduling pass synchronously
    #[command(name = "indexing:start")]
    IndexingStart,

    /// Register ids for indexing without fetching them
    #[command(name = "indexing:seed")]
    IndexingSeed {
        #[arg(required = true)]
        mal_ids: Vec<u64>,
    },

    /// Run the scheduler and refresh workers until interrupted
    Serve,
}
