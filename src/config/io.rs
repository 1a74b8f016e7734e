//! Configuration file I/O operations

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::Config;

impl Config {
    /// Get the global config directory path (~/.ecocredit/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ecocredit")
    }

    /// Get the global config file path (~/.ecocredit/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Load and validate configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from `path`, or the global config if `None`.
    ///
    /// A missing global config is not an error; built-in defaults apply.
    /// An explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let global_path = Self::global_config_path();
                if global_path.exists() {
                    Self::from_file(&global_path)
                } else {
                    tracing::debug!(
                        "No config at {}, using defaults",
                        global_path.display()
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validate and write this configuration to `path`
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        write_config_file(path, &content)
    }
}

/// Replace a config file in one step.
///
/// Writers serialise on a sibling `.lock` file; the content goes to a temp
/// file that is synced and then renamed over `path`, so readers see either
/// the old file or the new one.
pub fn write_config_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    let lock_path = path.with_extension("toml.lock");
    let lock = open_truncated(&lock_path)?;
    lock.lock_exclusive()
        .with_context(|| format!("Failed to lock {}", lock_path.display()))?;

    let temp_path = path.with_extension("toml.tmp");
    let mut temp = open_truncated(&temp_path)?;
    temp.write_all(content.as_bytes())
        .and_then(|()| temp.sync_all())
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;
    drop(temp);

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to replace config file: {}", path.display()))?;
    tracing::debug!("Wrote config {}", path.display());
    Ok(())
}

fn open_truncated(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}
