//! Init command implementation

use std::path::Path;

use anyhow::{Result, bail};

use ecocredit::config::{Config, write_config_file};

/// Default configuration content for `ecocredit init`
pub const DEFAULT_CONFIG: &str = r#"# Eco-credits ledger configuration
# ================================

# ============================================================================
# CREDITS - How verified activity time turns into unlocked eco-credits
# ============================================================================
#
# Verifying an activity unlocks duration_in_hours * rate credits, capped at
# the user's locked balance.
#
#   default_rate - credits per hour for activity types without an override
#   rates        - per-type overrides, keyed by lowercase activity type

[credits]
default_rate = 10.0

[credits.rates]
# cycling = 12.0
# gardening = 8.0

# ============================================================================
# STORAGE
# ============================================================================
#
#   path            - ledger database (default: ~/.ecocredit/ledger.db)
#   busy_timeout_ms - how long a writer waits for the database lock

[storage]
# path = "/var/lib/ecocredit/ledger.db"
busy_timeout_ms = 5000

# ============================================================================
# LEADERBOARD
# ============================================================================

[leaderboard]
default_limit = 10
"#;

/// Write the default configuration.
/// By default creates the global config at ~/.ecocredit/config.toml
pub fn init_command(config_path: Option<&Path>, force: bool) -> Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::global_config_path);

    if config_path.exists() && !force {
        bail!(
            "Configuration already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    write_config_file(&config_path, DEFAULT_CONFIG)?;
    println!("Created: {}", config_path.display());

    Ok(())
}
