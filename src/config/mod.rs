//! Configuration loading and management

mod io;
mod policy;

pub use io::write_config_file;
pub use policy::{CreditPolicy, DEFAULT_RATE};

use std::path::PathBuf;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Main configuration structure (`~/.ecocredit/config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Points-per-hour table used when verifying activities
    #[serde(default)]
    pub credits: CreditPolicy,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub leaderboard: LeaderboardSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Ledger database file; defaults to `~/.ecocredit/ledger.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How long a writer waits for the database lock before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSettings {
    #[serde(default = "default_leaderboard_limit")]
    pub default_limit: usize,
}

fn default_leaderboard_limit() -> usize {
    10
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            default_limit: default_leaderboard_limit(),
        }
    }
}

impl Config {
    /// Reject values the ledger cannot work with
    pub fn validate(&self) -> Result<()> {
        self.credits.validate()?;
        if self.leaderboard.default_limit == 0 {
            bail!("leaderboard.default_limit must be at least 1");
        }
        Ok(())
    }

    /// Database path from config, falling back to the global directory
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("ledger.db"))
    }
}
