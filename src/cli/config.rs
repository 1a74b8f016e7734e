//! Config command implementation

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Subcommand;

use ecocredit::config::Config;
use ecocredit::normalize_kind;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Set the credits-per-hour rate for one activity type
    SetRate {
        /// Activity type, e.g. "cycling"
        kind: String,
        rate: f64,
    },

    /// Remove a per-type rate so the default applies again
    UnsetRate { kind: String },

    /// Set the rate used for activity types without their own entry
    SetDefaultRate { rate: f64 },
}

pub fn run(config_path: Option<&Path>, cmd: ConfigCommand) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::global_config_path);

    if let ConfigCommand::Show = cmd {
        let config = load_or_default(&path)?;
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let config = update(&path, cmd)?;
    config.save_to_file(&path)?;
    println!("Updated: {}", path.display());
    Ok(())
}

fn load_or_default(path: &PathBuf) -> Result<Config> {
    if path.exists() {
        Config::from_file(path)
    } else {
        Ok(Config::default())
    }
}

/// Apply one change to the file's current contents
fn update(path: &PathBuf, cmd: ConfigCommand) -> Result<Config> {
    let mut config = load_or_default(path)?;
    match cmd {
        ConfigCommand::Show => {}
        ConfigCommand::SetRate { kind, rate } => {
            config.credits.rates.insert(normalize_kind(&kind), rate);
        }
        ConfigCommand::UnsetRate { kind } => {
            if config.credits.rates.remove(&normalize_kind(&kind)).is_none() {
                tracing::warn!("No rate set for '{}'", kind);
            }
        }
        ConfigCommand::SetDefaultRate { rate } => config.credits.default_rate = rate,
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::init::init_command;

    #[test]
    fn test_set_rate_writes_normalised_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        init_command(Some(&path), false).unwrap();

        run(Some(&path), ConfigCommand::SetRate { kind: " Cycling ".into(), rate: 25.0 }).unwrap();
        run(Some(&path), ConfigCommand::SetDefaultRate { rate: 4.0 }).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.credits.rate_for("cycling"), 25.0);
        assert_eq!(config.credits.rate_for("coding"), 4.0);
        assert!(config.credits.rates.contains_key("cycling"));

        run(Some(&path), ConfigCommand::UnsetRate { kind: "CYCLING".into() }).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().credits.rate_for("cycling"), 4.0);
    }

    #[test]
    fn test_invalid_rate_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(run(Some(&path), ConfigCommand::SetDefaultRate { rate: -2.0 }).is_err());
        assert!(!path.exists());

        run(Some(&path), ConfigCommand::SetRate { kind: "gardening".into(), rate: 12.0 }).unwrap();
        assert!(run(Some(&path), ConfigCommand::SetRate { kind: "gardening".into(), rate: f64::NAN }).is_err());
        assert_eq!(Config::from_file(&path).unwrap().credits.rate_for("gardening"), 12.0);
    }
}
