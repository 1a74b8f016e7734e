//! Leaderboard - users ranked by eco-credits
//!
//! Ranks use competition ranking: a user's rank is one plus the number of
//! users with strictly more unlocked credits, so ties share a rank.

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{LedgerAccount, Streaks, UserId};
use crate::error::LedgerResult;
use crate::ledger::load_account;
use crate::store::{LedgerStore, LedgerTx, StoreTx};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub user_id: UserId,
    pub username: String,
    pub eco_credits: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

/// Top of the board plus the requesting user's own position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standings {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub user_position: Option<LeaderboardEntry>,
    /// The user's friends, most credits first; empty without a user
    pub friends_positions: Vec<LeaderboardEntry>,
}

pub struct Leaderboard<'a, S: LedgerStore> {
    store: &'a S,
}

impl<'a, S: LedgerStore> Leaderboard<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn top(&self, limit: usize) -> LedgerResult<Vec<LeaderboardEntry>> {
        let mut tx = self.store.begin()?;
        top_in(&mut tx, limit, today())
    }

    pub fn position(&self, user_id: UserId) -> LedgerResult<LeaderboardEntry> {
        let mut tx = self.store.begin()?;
        let account = load_account(&mut tx, user_id)?;
        position_in(&mut tx, account, today())
    }

    /// `top(limit)`, where `user_id` stands even if outside the top, and
    /// where that user's friends stand
    pub fn standings(&self, limit: usize, user_id: Option<UserId>) -> LedgerResult<Standings> {
        let today = today();
        let mut tx = self.store.begin()?;
        let leaderboard = top_in(&mut tx, limit, today)?;

        let Some(user_id) = user_id else {
            return Ok(Standings {
                leaderboard,
                user_position: None,
                friends_positions: Vec::new(),
            });
        };

        let user_position = match leaderboard.iter().find(|e| e.user_id == user_id) {
            Some(found) => found.clone(),
            None => {
                let account = load_account(&mut tx, user_id)?;
                position_in(&mut tx, account, today)?
            }
        };

        let mut friends = Vec::new();
        for friend_id in tx.friends(user_id)? {
            if let Some(account) = tx.account(friend_id)? {
                friends.push(account);
            }
        }
        friends.sort_by(|a, b| {
            b.unlocked_credits
                .total_cmp(&a.unlocked_credits)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        let mut friends_positions = Vec::with_capacity(friends.len());
        for account in friends {
            friends_positions.push(position_in(&mut tx, account, today)?);
        }

        Ok(Standings {
            leaderboard,
            user_position: Some(user_position),
            friends_positions,
        })
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn top_in<T: StoreTx + ?Sized>(
    tx: &mut T,
    limit: usize,
    today: NaiveDate,
) -> LedgerResult<Vec<LeaderboardEntry>> {
    let accounts = tx.accounts_by_credits(limit)?;
    let ranks = competition_ranks(&accounts);
    let mut entries = Vec::with_capacity(accounts.len());
    for (rank, account) in ranks.into_iter().zip(accounts) {
        entries.push(entry(tx, rank, account, today)?);
    }
    Ok(entries)
}

fn position_in<T: StoreTx + ?Sized>(
    tx: &mut T,
    account: LedgerAccount,
    today: NaiveDate,
) -> LedgerResult<LeaderboardEntry> {
    let above = tx.count_accounts_above(account.unlocked_credits)?;
    entry(tx, above + 1, account, today)
}

fn entry<T: StoreTx + ?Sized>(
    tx: &mut T,
    rank: u64,
    account: LedgerAccount,
    today: NaiveDate,
) -> LedgerResult<LeaderboardEntry> {
    let streaks = Streaks::from_activities(&tx.activities(account.user_id)?, today);
    Ok(LeaderboardEntry {
        rank,
        user_id: account.user_id,
        username: account.username,
        eco_credits: account.unlocked_credits,
        current_streak: streaks.current,
        longest_streak: streaks.longest,
    })
}

/// Accounts must already be sorted by credits, highest first
fn competition_ranks(accounts: &[LedgerAccount]) -> Vec<u64> {
    let mut ranks: Vec<u64> = Vec::with_capacity(accounts.len());
    for (idx, account) in accounts.iter().enumerate() {
        let rank = match ranks.last() {
            Some(&prev) if accounts[idx - 1].unlocked_credits == account.unlocked_credits => prev,
            _ => idx as u64 + 1,
        };
        ranks.push(rank);
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActivityStatus;
    use crate::domain::{ActivityDuration, NewActivity};
    use crate::store::MemoryStore;

    fn account(user_id: UserId, credits: f64) -> LedgerAccount {
        let mut acct = LedgerAccount::new(user_id, format!("user{user_id}"), 0.0);
        acct.unlocked_credits = credits;
        acct
    }

    #[test]
    fn test_ties_share_rank() {
        let ranks = competition_ranks(&[
            account(1, 90.0),
            account(2, 50.0),
            account(3, 50.0),
            account(4, 10.0),
        ]);
        assert_eq!(ranks, vec![1, 2, 2, 4]);
    }

    #[test]
    fn test_entry_carries_streaks() {
        let store = MemoryStore::new();
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert_account(&account(1, 0.0)).unwrap();
        for day in [8, 9, 10] {
            let at = NaiveDate::from_ymd_opt(2024, 5, day)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
                .and_utc()
                .timestamp_millis();
            let new = NewActivity::new(1, "coding", ActivityDuration::default());
            let record = tx.insert_activity(&new, at).unwrap();
            tx.set_activity_status(record.id, ActivityStatus::Verified).unwrap();
        }

        let entry = position_in(&mut tx, account(1, 0.0), today).unwrap();
        assert_eq!(entry.rank, 1);
        assert_eq!((entry.current_streak, entry.longest_streak), (3, 3));

        let later = today.succ_opt().unwrap().succ_opt().unwrap();
        let entry = position_in(&mut tx, account(1, 0.0), later).unwrap();
        assert_eq!((entry.current_streak, entry.longest_streak), (0, 3));
    }
}
