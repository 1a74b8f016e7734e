//! Core domain types for the eco-credits ledger

mod account;
mod activity;
mod audit;
mod item;
mod reward;
mod streak;

pub use account::{AccountSnapshot, CREDIT_EPSILON, LedgerAccount, UserId, credits_eq};
pub use activity::{
    ActivityDuration, ActivityId, ActivityRecord, ActivityStatus, NewActivity, normalize_kind,
};
pub use audit::{AuditEvent, AuditRecord};
pub use item::{ItemId, ItemStatus, LockableItem, fifo_order};
pub use reward::{NewReward, Redemption, RedemptionId, Reward, RewardId, RewardView};
pub use streak::Streaks;
