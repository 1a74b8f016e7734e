//! Audit trail command

use anyhow::Result;

use ecocredit::AuditEvent;

use super::{Context, format_credits, format_ts};

pub fn run(ctx: &Context, user: Option<i64>) -> Result<()> {
    let records = ctx.ledger.audit_log(user)?;

    ctx.emit(&records, |records| {
        if records.is_empty() {
            println!("No audit entries.");
            return;
        }
        for record in records {
            println!("  {}  {}", format_ts(record.recorded_at), describe(&record.event));
        }
    })
}

fn describe(event: &AuditEvent) -> String {
    match event {
        AuditEvent::CreditsGranted {
            user_id,
            activity_id,
            points,
            duration_hours,
            multiplier,
        } => format!(
            "user #{user_id}: +{} eco-credits for activity #{activity_id} ({duration_hours:.2}h x {multiplier})",
            format_credits(*points)
        ),
        AuditEvent::ItemUnlocked {
            user_id,
            item_id,
            cost,
            pool_after,
        } => format!(
            "user #{user_id}: unlocked item #{item_id} for {}, pool {}",
            format_credits(*cost),
            format_credits(*pool_after)
        ),
        AuditEvent::ActivityRejected {
            user_id,
            activity_id,
        } => format!("user #{user_id}: activity #{activity_id} rejected"),
        AuditEvent::RewardRedeemed {
            user_id,
            reward_id,
            cost,
        } => format!(
            "user #{user_id}: redeemed reward #{reward_id} for {}",
            format_credits(*cost)
        ),
    }
}
