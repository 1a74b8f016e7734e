use serde::{Deserialize, Serialize};

use super::UserId;

pub type RewardId = i64;
pub type RedemptionId = i64;

/// An item in the rewards store, bought with unlocked credits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub name: String,
    pub description: String,
    pub cost: f64,
    pub category: String,
    pub available: bool,
    pub popular: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewReward {
    pub name: String,
    pub description: String,
    pub cost: f64,
    pub category: String,
    pub available: bool,
    pub popular: bool,
}

impl NewReward {
    pub fn new(name: impl Into<String>, cost: f64, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            cost,
            category: category.into(),
            available: true,
            popular: false,
        }
    }
}

/// A catalogue entry as shown to a browsing user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardView {
    #[serde(flatten)]
    pub reward: Reward,
    /// Redemptions by all users so far
    pub redemption_count: u64,
    /// Whether the viewing user's eco-credits cover the cost; absent without a viewer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_afford: Option<bool>,
}

/// A completed purchase; `cost` is what was paid at the time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: RedemptionId,
    pub user_id: UserId,
    pub reward_id: RewardId,
    pub cost: f64,
    pub redeemed_at: i64,
}
