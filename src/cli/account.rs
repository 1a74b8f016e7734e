//! Account commands

use anyhow::Result;
use clap::Subcommand;

use super::{Context, format_credits};

#[derive(Subcommand)]
pub enum AccountCommand {
    /// Open an account with an initial locked balance
    Open {
        user: i64,
        username: String,
        /// Credits earned but not yet unlocked
        #[arg(long, default_value_t = 0.0)]
        locked: f64,
    },

    /// Show balances
    Show { user: i64 },

    /// Add earned credits to the locked balance
    Grant { user: i64, credits: f64 },

    /// Make two users friends on the leaderboard
    Friend { user: i64, friend: i64 },
}

pub fn run(ctx: &Context, cmd: AccountCommand) -> Result<()> {
    match cmd {
        AccountCommand::Open {
            user,
            username,
            locked,
        } => {
            let account = ctx.ledger.open_account(user, &username, locked)?;
            ctx.emit(&account, |a| {
                println!(
                    "Opened account #{} ({}) with {} locked credits",
                    a.user_id,
                    a.username,
                    format_credits(a.locked_credits)
                );
            })
        }
        AccountCommand::Show { user } => {
            let account = ctx.ledger.account(user)?;
            ctx.emit(&account, |a| {
                println!("Account #{} ({})", a.user_id, a.username);
                println!("  Locked:       {}", format_credits(a.locked_credits));
                println!("  Eco-credits:  {}", format_credits(a.unlocked_credits));
                println!("  Pending pool: {}", format_credits(a.pending_pool));
            })
        }
        AccountCommand::Grant { user, credits } => {
            let snapshot = ctx.ledger.grant_locked(user, credits)?;
            ctx.emit(&snapshot, |s| {
                println!(
                    "Locked balance of #{} is now {}",
                    user,
                    format_credits(s.locked_credits)
                );
            })
        }
        AccountCommand::Friend { user, friend } => {
            ctx.ledger.add_friend(user, friend)?;
            let friends = ctx.ledger.friends(user)?;
            ctx.emit(&friends, |f| {
                println!("#{} now has {} friend(s)", user, f.len());
            })
        }
    }
}
