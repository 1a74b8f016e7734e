//! Rewards store - catalogue, filtered listing and redemption
//!
//! Redemption is the only operation that shrinks an account's total credit
//! mass: it debits unlocked credits by exactly the reward cost.

use chrono::Utc;
use tracing::info;

use crate::domain::{AuditEvent, NewReward, Redemption, Reward, RewardId, RewardView, UserId};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{ensure_amount, load_account};
use crate::store::{LedgerStore, LedgerTx, StoreTx};

/// Listing filters; every field is optional and they combine with AND
#[derive(Debug, Clone, Default)]
pub struct RewardFilter {
    pub category: Option<String>,
    pub available_only: bool,
    pub popular_only: bool,
    pub min_cost: Option<f64>,
    pub max_cost: Option<f64>,
    /// Case-insensitive match on name or description
    pub search: Option<String>,
    /// Only rewards this user can pay for now
    pub affordable_for: Option<UserId>,
    /// Fill in `can_afford` for this user; defaults to `affordable_for`
    pub viewer: Option<UserId>,
}

impl RewardFilter {
    fn matches(&self, reward: &Reward, budget: Option<f64>) -> bool {
        if let Some(category) = &self.category {
            if !reward.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if self.available_only && !reward.available {
            return false;
        }
        if self.popular_only && !reward.popular {
            return false;
        }
        if self.min_cost.is_some_and(|min| reward.cost < min) {
            return false;
        }
        if self.max_cost.is_some_and(|max| reward.cost > max) {
            return false;
        }
        if budget.is_some_and(|budget| reward.cost > budget) {
            return false;
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let hit = reward.name.to_lowercase().contains(&needle)
                || reward.description.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

pub struct Rewards<'a, S: LedgerStore> {
    store: &'a S,
}

impl<'a, S: LedgerStore> Rewards<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn add(&self, new: NewReward) -> LedgerResult<Reward> {
        if new.name.trim().is_empty() {
            return Err(LedgerError::invalid("reward name must not be empty"));
        }
        ensure_amount(new.cost, "reward cost", true)?;

        let mut tx = self.store.begin()?;
        let reward = tx.insert_reward(&new, Utc::now().timestamp_millis())?;
        tx.commit()?;

        info!(reward_id = reward.id, name = %reward.name, cost = reward.cost, "Added reward");
        Ok(reward)
    }

    pub fn get(&self, id: RewardId) -> LedgerResult<Reward> {
        let mut tx = self.store.begin()?;
        tx.reward(id)?.ok_or(LedgerError::UnknownReward(id))
    }

    /// Matching rewards, cheapest first
    pub fn list(&self, filter: &RewardFilter) -> LedgerResult<Vec<RewardView>> {
        let mut tx = self.store.begin()?;
        let budget = eco_credits_of(&mut tx, filter.affordable_for)?;
        let viewer_budget = match filter.viewer {
            Some(_) => eco_credits_of(&mut tx, filter.viewer)?,
            None => budget,
        };
        let counts = tx.redemption_counts()?;

        let mut rewards: Vec<Reward> = tx
            .rewards()?
            .into_iter()
            .filter(|r| filter.matches(r, budget))
            .collect();
        rewards.sort_by(|a, b| a.cost.total_cmp(&b.cost).then_with(|| a.name.cmp(&b.name)));

        Ok(rewards
            .into_iter()
            .map(|reward| RewardView {
                redemption_count: counts.get(&reward.id).copied().unwrap_or(0),
                can_afford: viewer_budget.map(|credits| credits >= reward.cost),
                reward,
            })
            .collect())
    }

    /// Spend unlocked credits on a reward
    pub fn redeem(&self, user_id: UserId, reward_id: RewardId) -> LedgerResult<Redemption> {
        let mut tx = self.store.begin()?;
        let reward = tx
            .reward(reward_id)?
            .ok_or(LedgerError::UnknownReward(reward_id))?;
        if !reward.available {
            return Err(LedgerError::RewardUnavailable(reward_id));
        }

        let mut account = load_account(&mut tx, user_id)?;
        if account.unlocked_credits < reward.cost {
            return Err(LedgerError::InsufficientCredits {
                user_id,
                required: reward.cost,
                available: account.unlocked_credits,
            });
        }

        account.unlocked_credits -= reward.cost;
        account.version = tx.update_account(&account)?;
        let redemption =
            tx.insert_redemption(user_id, reward_id, reward.cost, Utc::now().timestamp_millis())?;
        tx.append_audit(&AuditEvent::RewardRedeemed {
            user_id,
            reward_id,
            cost: reward.cost,
        })?;
        tx.commit()?;

        info!(
            user_id,
            reward_id,
            cost = reward.cost,
            eco_credits = account.unlocked_credits,
            "Redeemed {}",
            reward.name
        );
        Ok(redemption)
    }

    /// A user's redemptions, newest first
    pub fn history(&self, user_id: UserId) -> LedgerResult<Vec<Redemption>> {
        let mut tx = self.store.begin()?;
        tx.redemptions(user_id)
    }
}

fn eco_credits_of<T: LedgerTx + ?Sized>(
    tx: &mut T,
    user_id: Option<UserId>,
) -> LedgerResult<Option<f64>> {
    user_id
        .map(|id| load_account(tx, id).map(|a| a.unlocked_credits))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reward(name: &str, cost: f64, category: &str) -> Reward {
        Reward {
            id: 1,
            name: name.to_string(),
            description: "Plant a tree in your name".to_string(),
            cost,
            category: category.to_string(),
            available: true,
            popular: false,
            created_at: 0,
        }
    }

    #[test]
    fn test_filter_matches() {
        let tree = reward("Tree", 50.0, "nature");

        assert!(RewardFilter::default().matches(&tree, None));
        let by_category = RewardFilter {
            category: Some("Nature".to_string()),
            ..Default::default()
        };
        assert!(by_category.matches(&tree, None));

        let too_cheap = RewardFilter {
            max_cost: Some(49.0),
            ..Default::default()
        };
        assert!(!too_cheap.matches(&tree, None));

        let search = RewardFilter {
            search: Some("TREE".to_string()),
            ..Default::default()
        };
        assert!(search.matches(&tree, None));

        assert!(!RewardFilter::default().matches(&tree, Some(49.99)));
        assert!(RewardFilter::default().matches(&tree, Some(50.0)));
    }
}
