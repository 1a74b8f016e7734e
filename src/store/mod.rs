//! Repository interface between the ledger and its datastore
//!
//! All reads and writes go through a transaction obtained from
//! [`LedgerStore::begin`]. A transaction that is dropped without
//! [`StoreTx::commit`] is rolled back, so an error anywhere in an operation
//! leaves no partial mutation behind.
//!
//! ```text
//!  CreditUnlockEngine ──► LedgerTx   (accounts, unlock queue, audit)
//!  Ledger / Rewards  ──► StoreTx    (activities, rewards, reads, commit)
//!                            │
//!               ┌────────────┴────────────┐
//!               ▼                         ▼
//!         MemoryStore                SqliteStore
//! ```

mod memory;
mod sqlite;

pub use memory::{MemoryStore, MemoryTx};
pub use sqlite::{SqliteStore, SqliteTx};

use std::collections::BTreeMap;

use crate::domain::{
    ActivityId, ActivityRecord, ActivityStatus, AuditEvent, AuditRecord, ItemId, LedgerAccount,
    LockableItem, NewActivity, NewReward, Redemption, Reward, RewardId, UserId,
};
use crate::error::LedgerResult;

/// A datastore that hands out serializable transactions
pub trait LedgerStore: Send + Sync {
    type Tx<'a>: StoreTx
    where
        Self: 'a;

    /// Start a transaction. Writers are serialized; a transaction that cannot
    /// get the write lock fails with `ConcurrencyConflict`.
    fn begin(&self) -> LedgerResult<Self::Tx<'_>>;
}

/// The operations the unlock engine needs
pub trait LedgerTx {
    fn account(&mut self, user_id: UserId) -> LedgerResult<Option<LedgerAccount>>;

    /// Write balances back. Fails with `ConcurrencyConflict` when
    /// `account.version` no longer matches the stored row. Returns the new version.
    fn update_account(&mut self, account: &LedgerAccount) -> LedgerResult<i64>;

    /// Head of the user's unlock queue: oldest LOCKED item, lowest id on ties
    fn oldest_locked_item(&mut self, user_id: UserId) -> LedgerResult<Option<LockableItem>>;

    /// All LOCKED items for the user in queue order
    fn locked_items(&mut self, user_id: UserId) -> LedgerResult<Vec<LockableItem>>;

    fn mark_item_unlocked(&mut self, item_id: ItemId) -> LedgerResult<()>;

    fn append_audit(&mut self, event: &AuditEvent) -> LedgerResult<()>;

    /// The terminal status the engine already applied for an activity
    fn settlement(&mut self, activity_id: ActivityId) -> LedgerResult<Option<ActivityStatus>>;

    /// Mark an activity as applied. Fails with a validation error if it
    /// already was, so an activity can pay out at most once.
    fn record_settlement(
        &mut self,
        activity_id: ActivityId,
        user_id: UserId,
        status: ActivityStatus,
    ) -> LedgerResult<()>;
}

/// Full repository surface used by the application layer
pub trait StoreTx: LedgerTx {
    /// Fails with a validation error if the user already has an account
    fn insert_account(&mut self, account: &LedgerAccount) -> LedgerResult<()>;

    /// Accounts by unlocked credits, highest first, user id breaking ties
    fn accounts_by_credits(&mut self, limit: usize) -> LedgerResult<Vec<LedgerAccount>>;

    fn count_accounts_above(&mut self, unlocked_credits: f64) -> LedgerResult<u64>;

    fn activity(&mut self, id: ActivityId) -> LedgerResult<Option<ActivityRecord>>;

    fn activities(&mut self, user_id: UserId) -> LedgerResult<Vec<ActivityRecord>>;

    fn insert_activity(&mut self, new: &NewActivity, created_at: i64)
    -> LedgerResult<ActivityRecord>;

    fn set_activity_status(&mut self, id: ActivityId, status: ActivityStatus) -> LedgerResult<()>;

    fn insert_item(
        &mut self,
        user_id: UserId,
        cost: f64,
        created_at: i64,
    ) -> LedgerResult<LockableItem>;

    fn insert_reward(&mut self, new: &NewReward, created_at: i64) -> LedgerResult<Reward>;

    fn reward(&mut self, id: RewardId) -> LedgerResult<Option<Reward>>;

    fn rewards(&mut self) -> LedgerResult<Vec<Reward>>;

    fn insert_redemption(
        &mut self,
        user_id: UserId,
        reward_id: RewardId,
        cost: f64,
        redeemed_at: i64,
    ) -> LedgerResult<Redemption>;

    /// Number of redemptions per reward, across all users
    fn redemption_counts(&mut self) -> LedgerResult<BTreeMap<RewardId, u64>>;

    /// Newest first
    fn redemptions(&mut self, user_id: UserId) -> LedgerResult<Vec<Redemption>>;

    /// Friendship is symmetric; adding an existing pair is a no-op
    fn insert_friendship(&mut self, user_id: UserId, friend_id: UserId) -> LedgerResult<()>;

    fn friends(&mut self, user_id: UserId) -> LedgerResult<Vec<UserId>>;

    /// Oldest first; `None` returns every user's entries
    fn audit_log(&mut self, user_id: Option<UserId>) -> LedgerResult<Vec<AuditRecord>>;

    fn commit(self) -> LedgerResult<()>
    where
        Self: Sized;
}
