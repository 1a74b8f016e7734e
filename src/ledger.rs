//! Ledger facade
//!
//! Owns a store and the unlock engine, and wraps every operation in one store
//! transaction. Status changes go through [`Ledger::set_activity_status`],
//! which persists the new status and runs the engine before committing.

use chrono::Utc;
use tracing::info;

use crate::config::CreditPolicy;
use crate::domain::{
    AccountSnapshot, ActivityId, ActivityRecord, ActivityStatus, AuditRecord, ItemId, ItemStatus,
    LedgerAccount, LockableItem, NewActivity, UserId, normalize_kind,
};
use crate::engine::{CreditUnlockEngine, UnlockOutcome};
use crate::error::{LedgerError, LedgerResult};
use crate::leaderboard::Leaderboard;
use crate::rewards::Rewards;
use crate::store::{LedgerStore, LedgerTx, StoreTx};

pub struct Ledger<S: LedgerStore> {
    store: S,
    engine: CreditUnlockEngine,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S, policy: CreditPolicy) -> Self {
        Self {
            store,
            engine: CreditUnlockEngine::new(policy),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &CreditUnlockEngine {
        &self.engine
    }

    /// Reward catalogue and redemption
    pub fn rewards(&self) -> Rewards<'_, S> {
        Rewards::new(&self.store)
    }

    /// Ranking reads
    pub fn leaderboard(&self) -> Leaderboard<'_, S> {
        Leaderboard::new(&self.store)
    }

    // ========================================
    // ACCOUNTS
    // ========================================

    /// Create the account for a user with an initial locked balance
    pub fn open_account(
        &self,
        user_id: UserId,
        username: &str,
        locked_credits: f64,
    ) -> LedgerResult<LedgerAccount> {
        if username.trim().is_empty() {
            return Err(LedgerError::invalid("username must not be empty"));
        }
        ensure_amount(locked_credits, "locked credits", true)?;

        let account = LedgerAccount::new(user_id, username.trim(), locked_credits);
        let mut tx = self.store.begin()?;
        tx.insert_account(&account)?;
        tx.commit()?;

        info!(user_id, locked_credits, "Opened ledger account");
        Ok(account)
    }

    /// Add earned credits to the locked balance
    pub fn grant_locked(&self, user_id: UserId, credits: f64) -> LedgerResult<AccountSnapshot> {
        ensure_amount(credits, "credits", false)?;

        let mut tx = self.store.begin()?;
        let mut account = load_account(&mut tx, user_id)?;
        account.locked_credits += credits;
        account.version = tx.update_account(&account)?;
        tx.commit()?;

        info!(user_id, credits, locked = account.locked_credits, "Granted locked credits");
        Ok(account.snapshot())
    }

    pub fn account(&self, user_id: UserId) -> LedgerResult<LedgerAccount> {
        let mut tx = self.store.begin()?;
        load_account(&mut tx, user_id)
    }

    /// Current balances of a user
    pub fn get_account(&self, user_id: UserId) -> LedgerResult<AccountSnapshot> {
        Ok(self.account(user_id)?.snapshot())
    }

    /// Link two users as friends in both directions
    pub fn add_friend(&self, user_id: UserId, friend_id: UserId) -> LedgerResult<()> {
        if user_id == friend_id {
            return Err(LedgerError::invalid("a user cannot befriend themselves"));
        }
        let mut tx = self.store.begin()?;
        load_account(&mut tx, user_id)?;
        load_account(&mut tx, friend_id)?;
        tx.insert_friendship(user_id, friend_id)?;
        tx.commit()?;

        info!(user_id, friend_id, "Added friend");
        Ok(())
    }

    pub fn friends(&self, user_id: UserId) -> LedgerResult<Vec<UserId>> {
        let mut tx = self.store.begin()?;
        load_account(&mut tx, user_id)?;
        tx.friends(user_id)
    }

    // ========================================
    // ACTIVITIES
    // ========================================

    /// Log an activity; it starts PENDING
    pub fn submit_activity(&self, mut new: NewActivity) -> LedgerResult<ActivityRecord> {
        new.kind = normalize_kind(&new.kind);
        if new.kind.is_empty() {
            return Err(LedgerError::invalid("activity type must not be empty"));
        }

        let mut tx = self.store.begin()?;
        load_account(&mut tx, new.user_id)?;
        let record = tx.insert_activity(&new, Utc::now().timestamp_millis())?;
        tx.commit()?;

        info!(
            user_id = record.user_id,
            activity_id = record.id,
            kind = %record.kind,
            duration = %record.duration,
            "Activity submitted"
        );
        Ok(record)
    }

    pub fn activity(&self, id: ActivityId) -> LedgerResult<ActivityRecord> {
        let mut tx = self.store.begin()?;
        tx.activity(id)?.ok_or(LedgerError::UnknownActivity(id))
    }

    pub fn activities(&self, user_id: UserId) -> LedgerResult<Vec<ActivityRecord>> {
        let mut tx = self.store.begin()?;
        tx.activities(user_id)
    }

    /// Persist a verifier's decision and apply its ledger effects atomically.
    ///
    /// The prior status is read from the store. Setting the status an
    /// activity already has is a no-op; leaving VERIFIED or REJECTED is refused.
    pub fn set_activity_status(
        &self,
        id: ActivityId,
        status: ActivityStatus,
    ) -> LedgerResult<UnlockOutcome> {
        let mut tx = self.store.begin()?;
        let mut activity = tx.activity(id)?.ok_or(LedgerError::UnknownActivity(id))?;
        let previous = activity.status;

        if previous == status {
            return Ok(UnlockOutcome::default());
        }
        if previous.is_terminal() {
            return Err(LedgerError::invalid(format!(
                "activity {id} is already {previous} and cannot become {status}"
            )));
        }

        tx.set_activity_status(id, status)?;
        activity.status = status;

        let outcome = match status {
            ActivityStatus::Pending => UnlockOutcome::default(),
            _ => self.engine.on_activity_verified(&mut tx, &activity, previous)?,
        };
        tx.commit()?;
        Ok(outcome)
    }

    /// Run the engine for an activity whose status the caller already
    /// persisted. `previous` is the status it had before that write.
    pub fn on_activity_verified(
        &self,
        id: ActivityId,
        previous: ActivityStatus,
    ) -> LedgerResult<UnlockOutcome> {
        let mut tx = self.store.begin()?;
        let activity = tx.activity(id)?.ok_or(LedgerError::UnknownActivity(id))?;
        let outcome = self.engine.on_activity_verified(&mut tx, &activity, previous)?;
        tx.commit()?;
        Ok(outcome)
    }

    // ========================================
    // UNLOCK QUEUE
    // ========================================

    /// Queue a lockable item for a user
    pub fn add_item(&self, user_id: UserId, cost: f64) -> LedgerResult<LockableItem> {
        self.add_item_at(user_id, cost, Utc::now().timestamp_millis())
    }

    /// Queue an item with an explicit creation time (queue position).
    ///
    /// A leftover pool is spent right away, so the returned item may
    /// already be UNLOCKED.
    pub fn add_item_at(
        &self,
        user_id: UserId,
        cost: f64,
        created_at: i64,
    ) -> LedgerResult<LockableItem> {
        if !cost.is_finite() || cost <= 0.0 {
            return Err(LedgerError::invalid(format!("item cost must be positive, got {cost}")));
        }

        let mut tx = self.store.begin()?;
        load_account(&mut tx, user_id)?;
        let mut item = tx.insert_item(user_id, cost, created_at)?;
        let unlocked = self.engine.drain_queue(&mut tx, user_id)?;
        tx.commit()?;

        if unlocked.contains(&item.id) {
            item.status = ItemStatus::Unlocked;
        }
        info!(user_id, item_id = item.id, cost, status = %item.status, "Queued item");
        Ok(item)
    }

    /// Spend any pending pool on the user's queue
    pub fn drain_queue(&self, user_id: UserId) -> LedgerResult<Vec<ItemId>> {
        let mut tx = self.store.begin()?;
        let unlocked = self.engine.drain_queue(&mut tx, user_id)?;
        tx.commit()?;
        Ok(unlocked)
    }

    /// LOCKED items in the order they will be unlocked
    pub fn list_locked_items(&self, user_id: UserId) -> LedgerResult<Vec<LockableItem>> {
        let mut tx = self.store.begin()?;
        load_account(&mut tx, user_id)?;
        tx.locked_items(user_id)
    }

    pub fn audit_log(&self, user_id: Option<UserId>) -> LedgerResult<Vec<AuditRecord>> {
        let mut tx = self.store.begin()?;
        tx.audit_log(user_id)
    }
}

pub(crate) fn load_account<T: LedgerTx + ?Sized>(
    tx: &mut T,
    user_id: UserId,
) -> LedgerResult<LedgerAccount> {
    tx.account(user_id)?
        .ok_or(LedgerError::UnknownAccount(user_id))
}

pub(crate) fn ensure_amount(value: f64, what: &str, allow_zero: bool) -> LedgerResult<()> {
    let ok = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if !ok {
        return Err(LedgerError::invalid(format!("{what} must be a positive number, got {value}")));
    }
    Ok(())
}
