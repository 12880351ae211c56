//! Cli things
//!

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::storage::DbLocation;
use crate::versioning::{RetryPolicy, Versioning};

pub fn db_path_default() -> String {
    shellexpand::tilde("~/.cache/stashes.sqlite3").to_string()
}

#[derive(Parser, Debug)]
pub struct CliOpts {
    #[clap(long, help = "Path to the SQLite database file", env = "STASHES_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[clap(
        long,
        help = "Database URL, overrides --db-path (eg postgres://user@host/stashes)",
        env = "STASHES_DATABASE_URL"
    )]
    pub database_url: Option<String>,

    #[clap(long, help = "Enable debug logging")]
    pub debug: bool,

    #[clap(
        long,
        help = "Attempts at allocating a version number before giving up",
        env = "STASHES_VERSION_RETRY_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub version_retry_attempts: u32,

    #[clap(
        long,
        help = "Base back-off between version allocation attempts, in milliseconds",
        env = "STASHES_VERSION_RETRY_DELAY_MS",
        default_value_t = 10
    )]
    pub version_retry_delay_ms: u64,

    #[clap(
        long,
        help = "Upper bound on a single file write transaction, in seconds",
        env = "STASHES_TRANSACTION_TIMEOUT_SECS",
        default_value_t = 10
    )]
    pub transaction_timeout_secs: u64,

    #[clap(
        long,
        help = "Log statements slower than this, in milliseconds",
        env = "STASHES_SLOW_QUERY_MS"
    )]
    pub slow_query_ms: Option<u64>,
}

impl CliOpts {
    pub fn db_location(&self) -> DbLocation {
        match (&self.database_url, &self.db_path) {
            (Some(url), _) => DbLocation::Url(url.clone()),
            (None, Some(path)) => DbLocation::SqlitePath(path.clone()),
            (None, None) => DbLocation::SqlitePath(db_path_default().into()),
        }
    }

    pub fn versioning(&self) -> Versioning {
        Versioning::new(
            RetryPolicy {
                max_attempts: self.version_retry_attempts,
                base_delay: Duration::from_millis(self.version_retry_delay_ms),
            },
            Duration::from_secs(self.transaction_timeout_secs),
        )
    }
}
