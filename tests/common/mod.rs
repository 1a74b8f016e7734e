//! Shared test utilities for ledger integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use ecocredit::config::CreditPolicy;
use ecocredit::store::{MemoryStore, SqliteStore};
use ecocredit::{
    ActivityDuration, ActivityId, ActivityStatus, Ledger, LedgerAccount, NewActivity, UserId,
};

/// A ledger database inside its own temp dir. Keep the `TempDir` alive.
pub fn temp_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("ledger.db");
    (dir, path)
}

pub fn open_sqlite(path: &PathBuf) -> SqliteStore {
    SqliteStore::open(path, Duration::from_secs(10)).expect("Failed to open ledger db")
}

/// File-backed ledger with the default 10 credits/hour table
pub fn sqlite_ledger() -> (TempDir, Ledger<SqliteStore>) {
    let (dir, path) = temp_db();
    let ledger = Ledger::new(open_sqlite(&path), CreditPolicy::default());
    (dir, ledger)
}

pub fn memory_ledger() -> Ledger<MemoryStore> {
    Ledger::new(MemoryStore::new(), CreditPolicy::default())
}

pub fn open_account<S: ecocredit::store::LedgerStore>(
    ledger: &Ledger<S>,
    user_id: UserId,
    locked: f64,
) -> LedgerAccount {
    ledger
        .open_account(user_id, &format!("user{user_id}"), locked)
        .expect("Failed to open account")
}

pub fn duration(hours: u32, minutes: u32) -> ActivityDuration {
    ActivityDuration::new(hours, minutes, 0).expect("Invalid duration")
}

/// Submit a PENDING activity and return its id
pub fn log_activity<S: ecocredit::store::LedgerStore>(
    ledger: &Ledger<S>,
    user_id: UserId,
    kind: &str,
    hours: u32,
    minutes: u32,
) -> ActivityId {
    ledger
        .submit_activity(NewActivity::new(user_id, kind, duration(hours, minutes)))
        .expect("Failed to submit activity")
        .id
}

/// Submit and immediately verify an activity
pub fn verify_activity<S: ecocredit::store::LedgerStore>(
    ledger: &Ledger<S>,
    user_id: UserId,
    hours: u32,
    minutes: u32,
) -> ecocredit::UnlockOutcome {
    let id = log_activity(ledger, user_id, "coding", hours, minutes);
    ledger
        .set_activity_status(id, ActivityStatus::Verified)
        .expect("Failed to verify activity")
}

pub fn assert_credits(actual: f64, expected: f64) {
    assert!(
        ecocredit::credits_eq(actual, expected),
        "expected {expected} credits, got {actual}"
    );
}
