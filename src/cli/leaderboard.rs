//! Leaderboard command

use anyhow::Result;

use ecocredit::leaderboard::LeaderboardEntry;

use super::{Context, format_credits};

pub fn run(ctx: &Context, limit: Option<usize>, user: Option<i64>) -> Result<()> {
    let limit = limit.unwrap_or(ctx.config.leaderboard.default_limit);
    let standings = ctx.ledger.leaderboard().standings(limit, user)?;

    ctx.emit(&standings, |s| {
        if s.leaderboard.is_empty() {
            println!("No users yet.");
            return;
        }
        for entry in &s.leaderboard {
            print_entry(entry);
        }
        if let Some(me) = &s.user_position {
            println!("\nYour position: #{} with {}", me.rank, format_credits(me.eco_credits));
        }
        if !s.friends_positions.is_empty() {
            println!("\nFriends:");
            for entry in &s.friends_positions {
                print_entry(entry);
            }
        }
    })
}

fn print_entry(entry: &LeaderboardEntry) {
    println!(
        "  {:>3}. {:<24} {:>10}  streak {} (best {})",
        entry.rank,
        entry.username,
        format_credits(entry.eco_credits),
        entry.current_streak,
        entry.longest_streak
    );
}
