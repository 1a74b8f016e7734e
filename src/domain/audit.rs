use serde::{Deserialize, Serialize};

use super::{ActivityId, ItemId, RewardId, UserId};

/// A ledger mutation worth keeping a permanent record of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    CreditsGranted {
        user_id: UserId,
        activity_id: ActivityId,
        points: f64,
        duration_hours: f64,
        multiplier: f64,
    },
    ItemUnlocked {
        user_id: UserId,
        item_id: ItemId,
        cost: f64,
        pool_after: f64,
    },
    ActivityRejected {
        user_id: UserId,
        activity_id: ActivityId,
    },
    RewardRedeemed {
        user_id: UserId,
        reward_id: RewardId,
        cost: f64,
    },
}

impl AuditEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            AuditEvent::CreditsGranted { user_id, .. }
            | AuditEvent::ItemUnlocked { user_id, .. }
            | AuditEvent::ActivityRejected { user_id, .. }
            | AuditEvent::RewardRedeemed { user_id, .. } => *user_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::CreditsGranted { .. } => "credits_granted",
            AuditEvent::ItemUnlocked { .. } => "item_unlocked",
            AuditEvent::ActivityRejected { .. } => "activity_rejected",
            AuditEvent::RewardRedeemed { .. } => "reward_redeemed",
        }
    }
}

/// A stored audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub event: AuditEvent,
    pub recorded_at: i64,
}
