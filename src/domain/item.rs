use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::LedgerError;

pub type ItemId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemStatus {
    Locked,
    Unlocked,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Locked => "LOCKED",
            ItemStatus::Unlocked => "UNLOCKED",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCKED" => Ok(ItemStatus::Locked),
            "UNLOCKED" => Ok(ItemStatus::Unlocked),
            other => Err(LedgerError::invalid(format!("unknown item status '{other}'"))),
        }
    }
}

/// A gated resource (e.g. a coding session) bought from the pending pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockableItem {
    pub id: ItemId,
    pub user_id: UserId,
    pub cost: f64,
    pub status: ItemStatus,
    /// Milliseconds since epoch; defines queue order
    pub created_at: i64,
}

impl LockableItem {
    pub fn is_locked(&self) -> bool {
        self.status == ItemStatus::Locked
    }
}

/// Queue order: oldest first, id breaks ties
pub fn fifo_order(a: &LockableItem, b: &LockableItem) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
}
