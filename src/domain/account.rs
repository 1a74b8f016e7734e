use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// Relative tolerance used when comparing credit totals
pub const CREDIT_EPSILON: f64 = 1e-9;

/// Per-user credit balances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub user_id: UserId,
    pub username: String,
    /// Earned but not yet spendable
    pub locked_credits: f64,
    /// Spendable eco-credits
    pub unlocked_credits: f64,
    /// Unlocked points not yet consumed by the item queue
    pub pending_pool: f64,
    /// Bumped on every write; stale writers get a concurrency conflict
    pub version: i64,
}

impl LedgerAccount {
    pub fn new(user_id: UserId, username: impl Into<String>, locked_credits: f64) -> Self {
        Self {
            user_id,
            username: username.into(),
            locked_credits,
            unlocked_credits: 0.0,
            pending_pool: 0.0,
            version: 0,
        }
    }

    /// Locked plus unlocked; only redemption may shrink it
    pub fn total_credits(&self) -> f64 {
        self.locked_credits + self.unlocked_credits
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            locked_credits: self.locked_credits,
            unlocked_credits: self.unlocked_credits,
            pending_pool: self.pending_pool,
        }
    }

    pub fn has_negative_balance(&self) -> bool {
        self.locked_credits < 0.0 || self.unlocked_credits < 0.0 || self.pending_pool < 0.0
    }
}

/// Read-only view of an account's balances
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub locked_credits: f64,
    pub unlocked_credits: f64,
    pub pending_pool: f64,
}

/// `a == b` up to floating point noise scaled by magnitude
pub fn credits_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= CREDIT_EPSILON * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_is_fully_locked() {
        let acct = LedgerAccount::new(1, "ada", 120.0);
        assert_eq!(acct.total_credits(), 120.0);
        assert_eq!(acct.unlocked_credits, 0.0);
        assert!(!acct.has_negative_balance());
    }

    #[test]
    fn test_credits_eq_tolerance() {
        assert!(credits_eq(0.1 + 0.2, 0.3));
        assert!(credits_eq(1e12 + 0.0001, 1e12));
        assert!(!credits_eq(10.0, 10.01));
    }
}
