//! Activity commands

use anyhow::Result;
use clap::Subcommand;

use ecocredit::{ActivityDuration, ActivityStatus, NewActivity, UnlockOutcome};

use super::{Context, format_credits, format_ts};

#[derive(Subcommand)]
pub enum ActivityCommand {
    /// Log a new activity (starts PENDING)
    Log {
        #[arg(long)]
        user: i64,
        /// Activity type, e.g. coding, cycling, gardening
        #[arg(long)]
        kind: String,
        /// Time spent as H:MM:SS or MM:SS
        #[arg(long)]
        duration: ActivityDuration,
        #[arg(long)]
        description: Option<String>,
    },

    /// Mark an activity VERIFIED and unlock its credits
    Verify { id: i64 },

    /// Mark an activity REJECTED
    Reject { id: i64 },

    /// Show one activity
    Show { id: i64 },

    /// List a user's activities
    List {
        #[arg(long)]
        user: i64,
    },
}

pub fn run(ctx: &Context, cmd: ActivityCommand) -> Result<()> {
    match cmd {
        ActivityCommand::Log {
            user,
            kind,
            duration,
            description,
        } => {
            let mut new = NewActivity::new(user, &kind, duration);
            new.description = description;
            let record = ctx.ledger.submit_activity(new)?;
            ctx.emit(&record, |r| {
                println!("Logged activity #{} ({} for {}) - {}", r.id, r.kind, r.duration, r.status);
            })
        }
        ActivityCommand::Verify { id } => {
            let outcome = ctx.ledger.set_activity_status(id, ActivityStatus::Verified)?;
            ctx.emit(&outcome, |o| print_outcome(id, o))
        }
        ActivityCommand::Reject { id } => {
            let outcome = ctx.ledger.set_activity_status(id, ActivityStatus::Rejected)?;
            ctx.emit(&outcome, |_| println!("Activity #{} rejected", id))
        }
        ActivityCommand::Show { id } => {
            let record = ctx.ledger.activity(id)?;
            ctx.emit(&record, |r| {
                println!("Activity #{} [{}]", r.id, r.status);
                println!("  User:     #{}", r.user_id);
                println!("  Type:     {}", r.kind);
                println!("  Duration: {}", r.duration);
                println!("  Logged:   {}", format_ts(r.created_at));
                if let Some(desc) = &r.description {
                    println!("  {}", desc);
                }
            })
        }
        ActivityCommand::List { user } => {
            let records = ctx.ledger.activities(user)?;
            ctx.emit(&records, |records| {
                if records.is_empty() {
                    println!("No activities found.");
                    return;
                }
                println!("Activities ({}):\n", records.len());
                for r in records {
                    println!("  #{} [{}] {} {}", r.id, r.status, r.kind, r.duration);
                }
            })
        }
    }
}

fn print_outcome(id: i64, outcome: &UnlockOutcome) {
    if outcome.granted_points > 0.0 {
        println!(
            "Activity #{} verified: unlocked {} eco-credits (x{} per hour)",
            id,
            format_credits(outcome.granted_points),
            outcome.multiplier
        );
    } else {
        println!("Activity #{} verified: no locked credits left to unlock", id);
    }
    for item_id in &outcome.unlocked_item_ids {
        println!("  Unlocked item #{}", item_id);
    }
}
