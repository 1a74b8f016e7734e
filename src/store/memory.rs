//! In-process store
//!
//! A transaction holds the store mutex for its whole lifetime and works on a
//! staged copy of the state; commit swaps the copy in. Dropping the
//! transaction discards the copy.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::{LedgerStore, LedgerTx, StoreTx};
use crate::domain::{
    ActivityId, ActivityRecord, ActivityStatus, AuditEvent, AuditRecord, ItemId, ItemStatus,
    LedgerAccount, LockableItem, NewActivity, NewReward, Redemption, Reward, RewardId, UserId,
    fifo_order,
};
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: BTreeMap<UserId, LedgerAccount>,
    activities: BTreeMap<ActivityId, ActivityRecord>,
    items: BTreeMap<ItemId, LockableItem>,
    rewards: BTreeMap<RewardId, Reward>,
    redemptions: Vec<Redemption>,
    audit: Vec<AuditRecord>,
    settlements: BTreeMap<ActivityId, ActivityStatus>,
    friendships: BTreeSet<(UserId, UserId)>,
    last_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    type Tx<'a> = MemoryTx<'a>;

    fn begin(&self) -> LedgerResult<MemoryTx<'_>> {
        // Committed state is only ever replaced whole, so a poisoned lock
        // still guards a consistent value.
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let staged = guard.clone();
        Ok(MemoryTx { guard, staged })
    }
}

pub struct MemoryTx<'a> {
    guard: MutexGuard<'a, MemoryState>,
    staged: MemoryState,
}

impl LedgerTx for MemoryTx<'_> {
    fn account(&mut self, user_id: UserId) -> LedgerResult<Option<LedgerAccount>> {
        Ok(self.staged.accounts.get(&user_id).cloned())
    }

    fn update_account(&mut self, account: &LedgerAccount) -> LedgerResult<i64> {
        let stored = self
            .staged
            .accounts
            .get_mut(&account.user_id)
            .ok_or(LedgerError::UnknownAccount(account.user_id))?;
        if stored.version != account.version {
            return Err(LedgerError::ConcurrencyConflict {
                user_id: Some(account.user_id),
            });
        }
        *stored = account.clone();
        stored.version += 1;
        Ok(stored.version)
    }

    fn oldest_locked_item(&mut self, user_id: UserId) -> LedgerResult<Option<LockableItem>> {
        Ok(self
            .staged
            .items
            .values()
            .filter(|item| item.user_id == user_id && item.is_locked())
            .min_by(|a, b| fifo_order(a, b))
            .cloned())
    }

    fn locked_items(&mut self, user_id: UserId) -> LedgerResult<Vec<LockableItem>> {
        let mut items: Vec<LockableItem> = self
            .staged
            .items
            .values()
            .filter(|item| item.user_id == user_id && item.is_locked())
            .cloned()
            .collect();
        items.sort_by(fifo_order);
        Ok(items)
    }

    fn mark_item_unlocked(&mut self, item_id: ItemId) -> LedgerResult<()> {
        match self.staged.items.get_mut(&item_id) {
            Some(item) if item.is_locked() => {
                item.status = ItemStatus::Unlocked;
                Ok(())
            }
            _ => Err(LedgerError::invalid(format!("item {item_id} is not locked"))),
        }
    }

    fn append_audit(&mut self, event: &AuditEvent) -> LedgerResult<()> {
        let id = self.staged.next_id();
        self.staged.audit.push(AuditRecord {
            id,
            event: event.clone(),
            recorded_at: Utc::now().timestamp_millis(),
        });
        Ok(())
    }

    fn settlement(&mut self, activity_id: ActivityId) -> LedgerResult<Option<ActivityStatus>> {
        Ok(self.staged.settlements.get(&activity_id).copied())
    }

    fn record_settlement(
        &mut self,
        activity_id: ActivityId,
        _user_id: UserId,
        status: ActivityStatus,
    ) -> LedgerResult<()> {
        if let Some(existing) = self.staged.settlements.get(&activity_id) {
            return Err(LedgerError::invalid(format!(
                "activity {activity_id} was already settled as {existing}"
            )));
        }
        self.staged.settlements.insert(activity_id, status);
        Ok(())
    }
}

impl StoreTx for MemoryTx<'_> {
    fn insert_account(&mut self, account: &LedgerAccount) -> LedgerResult<()> {
        if self.staged.accounts.contains_key(&account.user_id) {
            return Err(LedgerError::invalid(format!(
                "user {} already has an account",
                account.user_id
            )));
        }
        self.staged.accounts.insert(account.user_id, account.clone());
        Ok(())
    }

    fn accounts_by_credits(&mut self, limit: usize) -> LedgerResult<Vec<LedgerAccount>> {
        let mut accounts: Vec<LedgerAccount> = self.staged.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| {
            b.unlocked_credits
                .total_cmp(&a.unlocked_credits)
                .then(a.user_id.cmp(&b.user_id))
        });
        accounts.truncate(limit);
        Ok(accounts)
    }

    fn count_accounts_above(&mut self, unlocked_credits: f64) -> LedgerResult<u64> {
        Ok(self
            .staged
            .accounts
            .values()
            .filter(|a| a.unlocked_credits > unlocked_credits)
            .count() as u64)
    }

    fn activity(&mut self, id: ActivityId) -> LedgerResult<Option<ActivityRecord>> {
        Ok(self.staged.activities.get(&id).cloned())
    }

    fn activities(&mut self, user_id: UserId) -> LedgerResult<Vec<ActivityRecord>> {
        Ok(self
            .staged
            .activities
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn insert_activity(
        &mut self,
        new: &NewActivity,
        created_at: i64,
    ) -> LedgerResult<ActivityRecord> {
        let record = ActivityRecord {
            id: self.staged.next_id(),
            user_id: new.user_id,
            kind: new.kind.clone(),
            duration: new.duration,
            status: ActivityStatus::Pending,
            description: new.description.clone(),
            created_at,
        };
        self.staged.activities.insert(record.id, record.clone());
        Ok(record)
    }

    fn set_activity_status(&mut self, id: ActivityId, status: ActivityStatus) -> LedgerResult<()> {
        let activity = self
            .staged
            .activities
            .get_mut(&id)
            .ok_or(LedgerError::UnknownActivity(id))?;
        activity.status = status;
        Ok(())
    }

    fn insert_item(
        &mut self,
        user_id: UserId,
        cost: f64,
        created_at: i64,
    ) -> LedgerResult<LockableItem> {
        let item = LockableItem {
            id: self.staged.next_id(),
            user_id,
            cost,
            status: ItemStatus::Locked,
            created_at,
        };
        self.staged.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn insert_reward(&mut self, new: &NewReward, created_at: i64) -> LedgerResult<Reward> {
        let reward = Reward {
            id: self.staged.next_id(),
            name: new.name.clone(),
            description: new.description.clone(),
            cost: new.cost,
            category: new.category.clone(),
            available: new.available,
            popular: new.popular,
            created_at,
        };
        self.staged.rewards.insert(reward.id, reward.clone());
        Ok(reward)
    }

    fn reward(&mut self, id: RewardId) -> LedgerResult<Option<Reward>> {
        Ok(self.staged.rewards.get(&id).cloned())
    }

    fn rewards(&mut self) -> LedgerResult<Vec<Reward>> {
        Ok(self.staged.rewards.values().cloned().collect())
    }

    fn insert_redemption(
        &mut self,
        user_id: UserId,
        reward_id: RewardId,
        cost: f64,
        redeemed_at: i64,
    ) -> LedgerResult<Redemption> {
        let redemption = Redemption {
            id: self.staged.next_id(),
            user_id,
            reward_id,
            cost,
            redeemed_at,
        };
        self.staged.redemptions.push(redemption.clone());
        Ok(redemption)
    }

    fn redemption_counts(&mut self) -> LedgerResult<BTreeMap<RewardId, u64>> {
        let mut counts = BTreeMap::new();
        for r in &self.staged.redemptions {
            *counts.entry(r.reward_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn redemptions(&mut self, user_id: UserId) -> LedgerResult<Vec<Redemption>> {
        let mut list: Vec<Redemption> = self
            .staged
            .redemptions
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    fn insert_friendship(&mut self, user_id: UserId, friend_id: UserId) -> LedgerResult<()> {
        self.staged.friendships.insert((user_id, friend_id));
        self.staged.friendships.insert((friend_id, user_id));
        Ok(())
    }

    fn friends(&mut self, user_id: UserId) -> LedgerResult<Vec<UserId>> {
        Ok(self
            .staged
            .friendships
            .range((user_id, UserId::MIN)..=(user_id, UserId::MAX))
            .map(|&(_, friend)| friend)
            .collect())
    }

    fn audit_log(&mut self, user_id: Option<UserId>) -> LedgerResult<Vec<AuditRecord>> {
        Ok(self
            .staged
            .audit
            .iter()
            .filter(|r| user_id.is_none_or(|u| r.event.user_id() == u))
            .cloned()
            .collect())
    }

    fn commit(mut self) -> LedgerResult<()> {
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_account(&LedgerAccount::new(1, "ada", 50.0)).unwrap();
        }
        let mut tx = store.begin().unwrap();
        assert!(tx.account(1).unwrap().is_none());
    }

    #[test]
    fn test_committed_transaction_is_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        tx.insert_account(&LedgerAccount::new(1, "ada", 50.0)).unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin().unwrap();
        assert_eq!(tx.account(1).unwrap().unwrap().locked_credits, 50.0);
    }

    #[test]
    fn test_stale_version_conflicts() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        tx.insert_account(&LedgerAccount::new(1, "ada", 50.0)).unwrap();

        let mut acct = tx.account(1).unwrap().unwrap();
        acct.version = tx.update_account(&acct).unwrap();
        assert_eq!(acct.version, 1);

        let mut stale = acct.clone();
        stale.version = 0;
        let err = tx.update_account(&stale).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::ConcurrencyConflict { user_id: Some(1) }
        ));
    }

    #[test]
    fn test_unlocked_item_cannot_be_unlocked_again() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let item = tx.insert_item(1, 5.0, 1).unwrap();

        tx.mark_item_unlocked(item.id).unwrap();
        let err = tx.mark_item_unlocked(item.id).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(tx.mark_item_unlocked(999).is_err());
    }

    #[test]
    fn test_settlement_is_recorded_once() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        assert_eq!(tx.settlement(4).unwrap(), None);

        tx.record_settlement(4, 1, ActivityStatus::Verified).unwrap();
        assert_eq!(tx.settlement(4).unwrap(), Some(ActivityStatus::Verified));
        assert!(tx.record_settlement(4, 1, ActivityStatus::Rejected).is_err());
    }

    #[test]
    fn test_friendship_is_symmetric() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        tx.insert_friendship(1, 3).unwrap();
        tx.insert_friendship(2, 1).unwrap();
        tx.insert_friendship(1, 3).unwrap();

        assert_eq!(tx.friends(1).unwrap(), vec![2, 3]);
        assert_eq!(tx.friends(3).unwrap(), vec![1]);
        assert!(tx.friends(4).unwrap().is_empty());
    }

    #[test]
    fn test_locked_items_fifo_with_id_tiebreak() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let late = tx.insert_item(1, 5.0, 200).unwrap();
        let tie_a = tx.insert_item(1, 5.0, 100).unwrap();
        let tie_b = tx.insert_item(1, 5.0, 100).unwrap();
        tx.insert_item(2, 5.0, 50).unwrap();

        let ids: Vec<ItemId> = tx.locked_items(1).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![tie_a.id, tie_b.id, late.id]);
        assert_eq!(tx.oldest_locked_item(1).unwrap().unwrap().id, tie_a.id);
    }
}
