//! Integration tests for verification unlocks and the FIFO queue against SQLite

mod common;

use common::{
    assert_credits, log_activity, open_account, sqlite_ledger, verify_activity,
};
use ecocredit::{ActivityStatus, AuditEvent, ErrorKind, ItemStatus, LedgerError};

#[test]
fn test_verification_conserves_credits_across_durations() {
    let (_dir, ledger) = sqlite_ledger();
    open_account(&ledger, 1, 100.0);

    // 1.5h, 0h, 2h15m and then a grant that hits the clamp
    for (hours, minutes) in [(1, 30), (0, 0), (2, 15), (8, 0)] {
        let before = ledger.get_account(1).unwrap();
        verify_activity(&ledger, 1, hours, minutes);
        let after = ledger.get_account(1).unwrap();

        assert_credits(
            before.locked_credits + before.unlocked_credits,
            after.locked_credits + after.unlocked_credits,
        );
        assert!(after.locked_credits >= 0.0);
    }

    let account = ledger.get_account(1).unwrap();
    assert_credits(account.locked_credits, 0.0);
    assert_credits(account.unlocked_credits, 100.0);
}

#[test]
fn test_verified_activity_unlocks_once() {
    let (_dir, ledger) = sqlite_ledger();
    open_account(&ledger, 1, 50.0);
    let id = log_activity(&ledger, 1, "cycling", 2, 0);

    let first = ledger.set_activity_status(id, ActivityStatus::Verified).unwrap();
    assert_credits(first.granted_points, 20.0);

    let again = ledger.set_activity_status(id, ActivityStatus::Verified).unwrap();
    assert_credits(again.granted_points, 0.0);

    // Replaying the hook for an already verified activity changes nothing
    let replay = ledger.on_activity_verified(id, ActivityStatus::Verified).unwrap();
    assert_credits(replay.granted_points, 0.0);

    let account = ledger.get_account(1).unwrap();
    assert_credits(account.locked_credits, 30.0);
    assert_credits(account.unlocked_credits, 20.0);

    let grants = ledger
        .audit_log(Some(1))
        .unwrap()
        .into_iter()
        .filter(|r| matches!(r.event, AuditEvent::CreditsGranted { .. }))
        .count();
    assert_eq!(grants, 1);
}

#[test]
fn test_fifo_unlocks_until_pool_runs_short() {
    let (_dir, ledger) = sqlite_ledger();
    open_account(&ledger, 1, 200.0);

    let first = ledger.add_item_at(1, 30.0, 1_000).unwrap();
    let second = ledger.add_item_at(1, 10.0, 2_000).unwrap();
    let third = ledger.add_item_at(1, 50.0, 3_000).unwrap();
    let fourth = ledger.add_item_at(1, 1.0, 4_000).unwrap();

    let outcome = verify_activity(&ledger, 1, 4, 30);
    assert_credits(outcome.granted_points, 45.0);
    assert_eq!(outcome.unlocked_item_ids, vec![first.id, second.id]);

    let account = ledger.get_account(1).unwrap();
    assert_credits(account.pending_pool, 5.0);

    // The cheap item behind the 50 stays locked
    let locked: Vec<_> = ledger
        .list_locked_items(1)
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(locked, vec![third.id, fourth.id]);
}

#[test]
fn test_pool_smaller_than_head_unlocks_nothing() {
    let (_dir, ledger) = sqlite_ledger();
    open_account(&ledger, 1, 100.0);
    let item = ledger.add_item_at(1, 10.0, 1_000).unwrap();

    let outcome = verify_activity(&ledger, 1, 0, 30);
    assert_credits(outcome.granted_points, 5.0);
    assert!(outcome.unlocked_item_ids.is_empty());
    assert_credits(ledger.get_account(1).unwrap().pending_pool, 5.0);

    // The next verification tops the pool up past the head's cost
    let outcome = verify_activity(&ledger, 1, 0, 30);
    assert_eq!(outcome.unlocked_item_ids, vec![item.id]);
    assert_credits(ledger.get_account(1).unwrap().pending_pool, 0.0);
}

#[test]
fn test_new_item_is_paid_from_leftover_pool() {
    let (_dir, ledger) = sqlite_ledger();
    open_account(&ledger, 1, 100.0);
    verify_activity(&ledger, 1, 1, 0);

    let item = ledger.add_item(1, 8.0).unwrap();
    assert_eq!(item.status, ItemStatus::Unlocked);
    assert_credits(ledger.get_account(1).unwrap().pending_pool, 2.0);
}

#[test]
fn test_rejection_moves_no_credits() {
    let (_dir, ledger) = sqlite_ledger();
    open_account(&ledger, 1, 40.0);
    let id = log_activity(&ledger, 1, "gardening", 3, 0);

    let outcome = ledger.set_activity_status(id, ActivityStatus::Rejected).unwrap();
    assert_credits(outcome.granted_points, 0.0);

    let account = ledger.get_account(1).unwrap();
    assert_credits(account.locked_credits, 40.0);
    assert_credits(account.unlocked_credits, 0.0);

    // REJECTED is final
    let err = ledger
        .set_activity_status(id, ActivityStatus::Verified)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_credits(ledger.get_account(1).unwrap().unlocked_credits, 0.0);

    let events: Vec<_> = ledger
        .audit_log(Some(1))
        .unwrap()
        .into_iter()
        .map(|r| r.event.name())
        .collect();
    assert_eq!(events, vec!["activity_rejected"]);
}

#[test]
fn test_unknown_account_and_activity() {
    let (_dir, ledger) = sqlite_ledger();

    assert!(matches!(
        ledger.get_account(42),
        Err(LedgerError::UnknownAccount(42))
    ));
    assert!(matches!(
        ledger.set_activity_status(7, ActivityStatus::Verified),
        Err(LedgerError::UnknownActivity(7))
    ));
    assert!(matches!(
        ledger.add_item(42, 5.0),
        Err(LedgerError::UnknownAccount(42))
    ));
}
