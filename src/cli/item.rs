//! Unlock queue commands

use anyhow::Result;
use clap::Subcommand;

use super::{Context, format_credits, format_ts};

#[derive(Subcommand)]
pub enum ItemCommand {
    /// Queue a lockable item (e.g. a coding session)
    Add {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        cost: f64,
    },

    /// List a user's LOCKED items in unlock order
    List {
        #[arg(long)]
        user: i64,
    },
}

pub fn run(ctx: &Context, cmd: ItemCommand) -> Result<()> {
    match cmd {
        ItemCommand::Add { user, cost } => {
            let item = ctx.ledger.add_item(user, cost)?;
            ctx.emit(&item, |i| {
                println!("Queued item #{} costing {} - {}", i.id, format_credits(i.cost), i.status);
            })
        }
        ItemCommand::List { user } => {
            let items = ctx.ledger.list_locked_items(user)?;
            let pool = ctx.ledger.get_account(user)?.pending_pool;
            ctx.emit(&items, |items| {
                if items.is_empty() {
                    println!("No locked items.");
                    return;
                }
                println!("Locked items ({}), pool {}:\n", items.len(), format_credits(pool));
                for (pos, item) in items.iter().enumerate() {
                    println!(
                        "  {}. #{} cost {} (queued {})",
                        pos + 1,
                        item.id,
                        format_credits(item.cost),
                        format_ts(item.created_at)
                    );
                }
            })
        }
    }
}
