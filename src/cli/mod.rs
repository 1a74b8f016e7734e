//! CLI command implementations

pub mod account;
pub mod activity;
pub mod audit;
pub mod config;
pub mod init;
pub mod item;
pub mod leaderboard;
pub mod reward;

pub use account::AccountCommand;
pub use activity::ActivityCommand;
pub use config::ConfigCommand;
pub use item::ItemCommand;
pub use reward::RewardCommand;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

use ecocredit::Ledger;
use ecocredit::config::Config;
use ecocredit::store::SqliteStore;

/// Everything a command needs: loaded config and an open ledger
pub struct Context {
    pub config: Config,
    pub ledger: Ledger<SqliteStore>,
    pub json: bool,
}

impl Context {
    pub fn open(config_path: Option<&Path>, db_path: Option<&Path>, json: bool) -> Result<Self> {
        let config = Config::load(config_path)?;
        let db_path = db_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.database_path());

        let store = SqliteStore::open(
            &db_path,
            Duration::from_millis(config.storage.busy_timeout_ms),
        )
        .with_context(|| format!("Failed to open ledger db: {}", db_path.display()))?;
        tracing::debug!("Opened ledger at {}", db_path.display());

        let ledger = Ledger::new(store, config.credits.clone());
        Ok(Self {
            config,
            ledger,
            json,
        })
    }

    /// Print `value` as JSON in `--json` mode, otherwise run `human`
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}

/// Render a millisecond timestamp in local time
pub fn format_ts(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_credits(credits: f64) -> String {
    format!("{:.2}", credits)
}
