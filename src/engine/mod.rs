//! Credit unlock engine - core ledger logic
//!
//! When an activity transitions into VERIFIED, the engine moves points from
//! the account's locked balance to its unlocked balance and feeds the same
//! points into the pending pool. The pool then buys queued lockable items
//! strictly in FIFO order.
//!
//! The engine never opens or commits a transaction itself. Callers hand it an
//! open [`LedgerTx`] and commit only when it returns `Ok`, so every balance
//! change, item unlock and audit entry of one invocation lands together or
//! not at all.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::CreditPolicy;
use crate::domain::{
    ActivityRecord, ActivityStatus, AuditEvent, ItemId, LedgerAccount, UserId, credits_eq,
};
use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerTx;

/// Points computed for one verified activity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grant {
    pub duration_hours: f64,
    pub multiplier: f64,
    /// `duration_hours * multiplier` before capping
    pub raw_points: f64,
    /// Raw points clamped to `[0, locked_credits]`
    pub granted_points: f64,
}

/// What a verification did to the account
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnlockOutcome {
    pub granted_points: f64,
    pub multiplier: f64,
    /// Items bought from the pending pool, in unlock order
    pub unlocked_item_ids: Vec<ItemId>,
}

pub struct CreditUnlockEngine {
    policy: CreditPolicy,
}

impl CreditUnlockEngine {
    pub fn new(policy: CreditPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CreditPolicy {
        &self.policy
    }

    /// Points an activity is worth against a given locked balance
    pub fn grant_for(&self, activity: &ActivityRecord, locked_credits: f64) -> LedgerResult<Grant> {
        let duration_hours = activity.duration.as_hours();
        let multiplier = self.policy.rate_for(&activity.kind);
        let raw_points = duration_hours * multiplier;
        if !raw_points.is_finite() {
            return Err(LedgerError::invalid(format!(
                "activity {} yields non-finite points ({duration_hours}h x {multiplier})",
                activity.id
            )));
        }

        Ok(Grant {
            duration_hours,
            multiplier,
            raw_points,
            granted_points: raw_points.clamp(0.0, locked_credits.max(0.0)),
        })
    }

    /// React to an activity status change.
    ///
    /// Only the edge into VERIFIED (`previous != Verified`) moves credits; a
    /// repeat with `previous == Verified` is a no-op. The edge into REJECTED
    /// writes an audit entry and touches no balance.
    ///
    /// Each activity is settled at most once. The settlement is stored in the
    /// same transaction, so a retried call whose `previous` is stale still
    /// cannot pay out twice, and an activity settled as REJECTED can never
    /// collect a grant later.
    pub fn on_activity_verified<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        activity: &ActivityRecord,
        previous: ActivityStatus,
    ) -> LedgerResult<UnlockOutcome> {
        if activity.status == ActivityStatus::Pending {
            return Err(LedgerError::invalid(format!(
                "activity {} is still PENDING",
                activity.id
            )));
        }

        match tx.settlement(activity.id)? {
            Some(settled) if settled == activity.status => {
                debug!(activity_id = activity.id, status = %settled, "Activity already settled, skipping");
                return Ok(UnlockOutcome::default());
            }
            Some(settled) => {
                return Err(LedgerError::invalid(format!(
                    "activity {} was settled as {settled} and cannot become {}",
                    activity.id, activity.status
                )));
            }
            None if previous == activity.status => {
                debug!(activity_id = activity.id, status = %previous, "No status edge, skipping");
                return Ok(UnlockOutcome::default());
            }
            None => {}
        }

        if activity.status == ActivityStatus::Rejected {
            tx.record_settlement(activity.id, activity.user_id, ActivityStatus::Rejected)?;
            tx.append_audit(&AuditEvent::ActivityRejected {
                user_id: activity.user_id,
                activity_id: activity.id,
            })?;
            info!(
                user_id = activity.user_id,
                activity_id = activity.id,
                "Activity rejected, no credits unlocked"
            );
            return Ok(UnlockOutcome::default());
        }

        let mut account = tx
            .account(activity.user_id)?
            .ok_or(LedgerError::UnknownAccount(activity.user_id))?;
        let total_before = account.total_credits();

        let grant = self.grant_for(activity, account.locked_credits)?;
        let granted = grant.granted_points;
        tx.record_settlement(activity.id, activity.user_id, ActivityStatus::Verified)?;

        if granted > 0.0 {
            account.locked_credits -= granted;
            account.unlocked_credits += granted;
            account.pending_pool += granted;

            tx.append_audit(&AuditEvent::CreditsGranted {
                user_id: account.user_id,
                activity_id: activity.id,
                points: granted,
                duration_hours: grant.duration_hours,
                multiplier: grant.multiplier,
            })?;
            info!(
                user_id = account.user_id,
                activity_id = activity.id,
                points = granted,
                duration_hours = grant.duration_hours,
                multiplier = grant.multiplier,
                eco_credits = account.unlocked_credits,
                "Unlocked eco-credits"
            );
        } else {
            debug!(
                user_id = account.user_id,
                activity_id = activity.id,
                raw_points = grant.raw_points,
                locked = account.locked_credits,
                "Nothing to unlock"
            );
        }

        let unlocked_item_ids = self.drain_pool(tx, &mut account)?;

        if granted > 0.0 || !unlocked_item_ids.is_empty() {
            check_conservation(&account, total_before)?;
            account.version = tx.update_account(&account)?;
        }

        Ok(UnlockOutcome {
            granted_points: granted,
            multiplier: grant.multiplier,
            unlocked_item_ids,
        })
    }

    /// Spend the user's pending pool on their unlock queue and persist the result
    pub fn drain_queue<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        user_id: UserId,
    ) -> LedgerResult<Vec<ItemId>> {
        let mut account = tx
            .account(user_id)?
            .ok_or(LedgerError::UnknownAccount(user_id))?;
        let total_before = account.total_credits();

        let unlocked = self.drain_pool(tx, &mut account)?;
        if !unlocked.is_empty() {
            check_conservation(&account, total_before)?;
            account.version = tx.update_account(&account)?;
        }
        Ok(unlocked)
    }

    /// FIFO drain on an in-memory account. Stops at the first item the pool
    /// cannot cover; later, cheaper items are never bought out of order.
    fn drain_pool<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        account: &mut LedgerAccount,
    ) -> LedgerResult<Vec<ItemId>> {
        let mut unlocked = Vec::new();

        while account.pending_pool > 0.0 {
            let Some(item) = tx.oldest_locked_item(account.user_id)? else {
                break;
            };

            let covers = account.pending_pool > item.cost || credits_eq(account.pending_pool, item.cost);
            if !covers {
                debug!(
                    user_id = account.user_id,
                    item_id = item.id,
                    cost = item.cost,
                    pool = account.pending_pool,
                    "Pool too small for next queued item"
                );
                break;
            }

            tx.mark_item_unlocked(item.id)?;
            account.pending_pool = (account.pending_pool - item.cost).max(0.0);
            unlocked.push(item.id);

            tx.append_audit(&AuditEvent::ItemUnlocked {
                user_id: account.user_id,
                item_id: item.id,
                cost: item.cost,
                pool_after: account.pending_pool,
            })?;
            info!(
                user_id = account.user_id,
                item_id = item.id,
                cost = item.cost,
                pool = account.pending_pool,
                "Unlocked queued item"
            );
        }

        Ok(unlocked)
    }
}

/// Every balance non-negative and locked + unlocked unchanged
fn check_conservation(account: &LedgerAccount, total_before: f64) -> LedgerResult<()> {
    let total_after = account.total_credits();
    if account.has_negative_balance() || !credits_eq(total_before, total_after) {
        return Err(LedgerError::ConservationViolation {
            user_id: account.user_id,
            before: total_before,
            after: total_after,
            locked: account.locked_credits,
            unlocked: account.unlocked_credits,
            pool: account.pending_pool,
        });
    }
    Ok(())
}
