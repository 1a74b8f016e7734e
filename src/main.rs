use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

use cli::{AccountCommand, ActivityCommand, ConfigCommand, Context, ItemCommand, RewardCommand};

#[derive(Parser)]
#[command(name = "ecocredit")]
#[command(about = "Eco-credits ledger - verify activities, unlock credits, redeem rewards")]
#[command(version)]
struct Cli {
    /// Path to the ledger database (defaults to storage.path or ~/.ecocredit/ledger.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the config file (defaults to ~/.ecocredit/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show or edit the config file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Manage ledger accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Log and verify activities
    #[command(subcommand)]
    Activity(ActivityCommand),

    /// Manage the unlock queue
    #[command(subcommand)]
    Item(ItemCommand),

    /// Browse and redeem rewards
    #[command(subcommand)]
    Reward(RewardCommand),

    /// Show users ranked by eco-credits
    Leaderboard {
        /// Number of users to show (defaults to leaderboard.default_limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Also show this user's position
        #[arg(long)]
        user: Option<i64>,
    },

    /// Show the audit trail
    Audit {
        /// Only entries for this user
        #[arg(long)]
        user: Option<i64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let open = || Context::open(cli.config.as_deref(), cli.db.as_deref(), cli.json);

    match cli.command {
        Commands::Init { force } => cli::init::init_command(cli.config.as_deref(), force)?,
        Commands::Config(cmd) => cli::config::run(cli.config.as_deref(), cmd)?,
        Commands::Account(cmd) => cli::account::run(&open()?, cmd)?,
        Commands::Activity(cmd) => cli::activity::run(&open()?, cmd)?,
        Commands::Item(cmd) => cli::item::run(&open()?, cmd)?,
        Commands::Reward(cmd) => cli::reward::run(&open()?, cmd)?,
        Commands::Leaderboard { limit, user } => cli::leaderboard::run(&open()?, limit, user)?,
        Commands::Audit { user } => cli::audit::run(&open()?, user)?,
    }

    Ok(())
}
