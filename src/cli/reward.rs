//! Rewards store commands

use anyhow::Result;
use clap::Subcommand;

use ecocredit::NewReward;
use ecocredit::rewards::RewardFilter;

use super::{Context, format_credits, format_ts};

#[derive(Subcommand)]
pub enum RewardCommand {
    /// Add a reward to the store
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        cost: f64,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Flag as a popular reward
        #[arg(long)]
        popular: bool,
        /// List but do not allow redemption yet
        #[arg(long)]
        unavailable: bool,
    },

    /// List rewards, cheapest first
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        min_cost: Option<f64>,
        #[arg(long)]
        max_cost: Option<f64>,
        /// Search name and description
        #[arg(long)]
        search: Option<String>,
        /// Only rewards this user can afford
        #[arg(long)]
        affordable_for: Option<i64>,
        /// Show whether this user can afford each reward
        #[arg(long)]
        user: Option<i64>,
        /// Include rewards that cannot be redeemed
        #[arg(long)]
        all: bool,
    },

    /// Spend eco-credits on a reward
    Redeem {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        reward: i64,
    },

    /// Show a user's redemptions
    History {
        #[arg(long)]
        user: i64,
    },
}

pub fn run(ctx: &Context, cmd: RewardCommand) -> Result<()> {
    let rewards = ctx.ledger.rewards();

    match cmd {
        RewardCommand::Add {
            name,
            cost,
            category,
            description,
            popular,
            unavailable,
        } => {
            let mut new = NewReward::new(name, cost, category);
            new.description = description;
            new.popular = popular;
            new.available = !unavailable;
            let reward = rewards.add(new)?;
            ctx.emit(&reward, |r| {
                println!("Added reward #{} {} ({})", r.id, r.name, format_credits(r.cost));
            })
        }
        RewardCommand::List {
            category,
            min_cost,
            max_cost,
            search,
            affordable_for,
            user,
            all,
        } => {
            let filter = RewardFilter {
                category,
                available_only: !all,
                popular_only: false,
                min_cost,
                max_cost,
                search,
                affordable_for,
                viewer: user,
            };
            let list = rewards.list(&filter)?;
            ctx.emit(&list, |list| {
                if list.is_empty() {
                    println!("No rewards found.");
                    return;
                }
                for view in list {
                    let r = &view.reward;
                    let star = if r.popular { " *" } else { "" };
                    let afford = match view.can_afford {
                        Some(true) => "  affordable",
                        Some(false) => "  need more credits",
                        None => "",
                    };
                    println!(
                        "  #{} {:<30} {:>10}  [{}] {} redeemed{}{}",
                        r.id,
                        r.name,
                        format_credits(r.cost),
                        r.category,
                        view.redemption_count,
                        star,
                        afford
                    );
                }
            })
        }
        RewardCommand::Redeem { user, reward } => {
            let redemption = rewards.redeem(user, reward)?;
            let name = rewards.get(reward)?.name;
            ctx.emit(&redemption, |r| {
                println!("Successfully redeemed {}! ({} eco-credits)", name, format_credits(r.cost));
            })
        }
        RewardCommand::History { user } => {
            let history = rewards.history(user)?;
            ctx.emit(&history, |history| {
                if history.is_empty() {
                    println!("No redemptions yet.");
                    return;
                }
                for r in history {
                    println!(
                        "  {}  reward #{}  {}",
                        format_ts(r.redeemed_at),
                        r.reward_id,
                        format_credits(r.cost)
                    );
                }
            })
        }
    }
}
