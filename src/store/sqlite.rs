//! SQLite-backed store
//!
//! Manages the `~/.ecocredit/ledger.db` database with automatic schema
//! migration. Transactions use `BEGIN IMMEDIATE` so the write lock is taken up
//! front; a second writer waits up to the busy timeout and then fails with
//! `ConcurrencyConflict`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use super::{LedgerStore, LedgerTx, StoreTx};
use crate::domain::{
    ActivityDuration, ActivityId, ActivityRecord, ActivityStatus, AuditEvent, AuditRecord, ItemId,
    ItemStatus, LedgerAccount, LockableItem, NewActivity, NewReward, Redemption, Reward, RewardId,
    UserId,
};
use crate::error::{LedgerError, LedgerResult};

/// Database wrapper; clones share one connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the ledger database at a specific path
    pub fn open(path: &Path, busy_timeout: Duration) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::invalid(format!(
                    "cannot create ledger dir {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn, busy_timeout)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> LedgerResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, Duration::from_secs(5))
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> LedgerResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(busy_timeout)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // rusqlite leaves the connection usable after a panic; any open
        // transaction was rolled back by SqliteTx::drop during unwinding.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> LedgerResult<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)?;
        Self::run_migrations(&conn)?;
        Ok(())
    }

    /// Bring older databases up to the current schema
    fn run_migrations(conn: &Connection) -> LedgerResult<()> {
        let version: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )?;

        // Migration 2: record when each item was unlocked
        if version < 2 {
            let has_unlocked_at: bool = conn.query_row(
                "SELECT COUNT(*) FROM pragma_table_info('lockable_items') WHERE name = 'unlocked_at'",
                [],
                |r| r.get::<_, i64>(0).map(|c| c > 0),
            )?;
            if !has_unlocked_at {
                conn.execute_batch("ALTER TABLE lockable_items ADD COLUMN unlocked_at INTEGER;")?;
            }
            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
        }

        // Migration 3: leaderboard index
        if version < 3 {
            conn.execute_batch(
                "CREATE INDEX IF NOT EXISTS idx_accounts_unlocked ON accounts(unlocked_credits DESC, user_id);",
            )?;
            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (3)", [])?;
        }

        // Migration 4: per-activity settlement marker and friendships
        if version < 4 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS activity_settlements (
                    activity_id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    settled_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS friendships (
                    user_id INTEGER NOT NULL REFERENCES accounts(user_id),
                    friend_id INTEGER NOT NULL REFERENCES accounts(user_id),
                    created_at INTEGER NOT NULL,
                    PRIMARY KEY (user_id, friend_id)
                );
                "#,
            )?;
            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (4)", [])?;
        }

        Ok(())
    }

    pub fn schema_version(&self) -> LedgerResult<i64> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))?)
    }
}

impl LedgerStore for SqliteStore {
    type Tx<'a> = SqliteTx<'a>;

    fn begin(&self) -> LedgerResult<SqliteTx<'_>> {
        let conn = self.conn();
        conn.execute_batch("BEGIN IMMEDIATE").map_err(map_err)?;
        Ok(SqliteTx {
            conn,
            finished: false,
        })
    }
}

/// An open `BEGIN IMMEDIATE` transaction; rolls back on drop unless committed
pub struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Failed to roll back ledger transaction: {}", e);
            }
        }
    }
}

/// BUSY / LOCKED means another writer holds the database
fn map_err(err: rusqlite::Error) -> LedgerError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            LedgerError::ConcurrencyConflict { user_id: None }
        }
        _ => LedgerError::Storage(err),
    }
}

fn conversion_err(idx: usize, err: LedgerError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerAccount> {
    Ok(LedgerAccount {
        user_id: row.get(0)?,
        username: row.get(1)?,
        locked_credits: row.get(2)?,
        unlocked_credits: row.get(3)?,
        pending_pool: row.get(4)?,
        version: row.get(5)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<LockableItem> {
    let status: String = row.get(3)?;
    Ok(LockableItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        cost: row.get(2)?,
        status: status.parse().map_err(|e| conversion_err(3, e))?,
        created_at: row.get(4)?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
    let secs: i64 = row.get(3)?;
    let duration = u64::try_from(secs)
        .map_err(|_| LedgerError::invalid(format!("negative duration {secs}")))
        .and_then(ActivityDuration::from_total_seconds)
        .map_err(|e| conversion_err(3, e))?;
    let status: String = row.get(4)?;
    Ok(ActivityRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        duration,
        status: status.parse().map_err(|e| conversion_err(4, e))?,
        description: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn reward_from_row(row: &Row<'_>) -> rusqlite::Result<Reward> {
    Ok(Reward {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        cost: row.get(3)?,
        category: row.get(4)?,
        available: row.get(5)?,
        popular: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn redemption_from_row(row: &Row<'_>) -> rusqlite::Result<Redemption> {
    Ok(Redemption {
        id: row.get(0)?,
        user_id: row.get(1)?,
        reward_id: row.get(2)?,
        cost: row.get(3)?,
        redeemed_at: row.get(4)?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "user_id, username, locked_credits, unlocked_credits, pending_pool, version";
const ITEM_COLUMNS: &str = "id, user_id, cost, status, created_at";
const ACTIVITY_COLUMNS: &str = "id, user_id, kind, duration_secs, status, description, created_at";
const REWARD_COLUMNS: &str = "id, name, description, cost, category, available, popular, created_at";

impl LedgerTx for SqliteTx<'_> {
    fn account(&mut self, user_id: UserId) -> LedgerResult<Option<LedgerAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [user_id], account_from_row)
            .optional()?)
    }

    fn update_account(&mut self, account: &LedgerAccount) -> LedgerResult<i64> {
        let changed = self
            .conn
            .execute(
                r#"UPDATE accounts
                   SET locked_credits = ?2, unlocked_credits = ?3, pending_pool = ?4,
                       version = version + 1
                   WHERE user_id = ?1 AND version = ?5"#,
                params![
                    account.user_id,
                    account.locked_credits,
                    account.unlocked_credits,
                    account.pending_pool,
                    account.version,
                ],
            )
            .map_err(map_err)?;

        if changed == 0 {
            return match self.account(account.user_id)? {
                Some(_) => Err(LedgerError::ConcurrencyConflict {
                    user_id: Some(account.user_id),
                }),
                None => Err(LedgerError::UnknownAccount(account.user_id)),
            };
        }
        Ok(account.version + 1)
    }

    fn oldest_locked_item(&mut self, user_id: UserId) -> LedgerResult<Option<LockableItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM lockable_items
             WHERE user_id = ?1 AND status = 'LOCKED'
             ORDER BY created_at ASC, id ASC LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, [user_id], item_from_row)
            .optional()?)
    }

    fn locked_items(&mut self, user_id: UserId) -> LedgerResult<Vec<LockableItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM lockable_items
             WHERE user_id = ?1 AND status = 'LOCKED'
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map([user_id], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn mark_item_unlocked(&mut self, item_id: ItemId) -> LedgerResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE lockable_items SET status = ?2, unlocked_at = ?3 WHERE id = ?1 AND status = 'LOCKED'",
                params![item_id, ItemStatus::Unlocked.as_str(), Utc::now().timestamp_millis()],
            )
            .map_err(map_err)?;
        if changed == 0 {
            return Err(LedgerError::invalid(format!("item {item_id} is not locked")));
        }
        Ok(())
    }

    fn append_audit(&mut self, event: &AuditEvent) -> LedgerResult<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| LedgerError::invalid(format!("cannot encode audit event: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO audit_log (user_id, event, payload, recorded_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    event.user_id(),
                    event.name(),
                    payload,
                    Utc::now().timestamp_millis()
                ],
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn settlement(&mut self, activity_id: ActivityId) -> LedgerResult<Option<ActivityStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM activity_settlements WHERE activity_id = ?1",
                [activity_id],
                |r| r.get(0),
            )
            .optional()?;
        status.map(|s| s.parse::<ActivityStatus>()).transpose()
    }

    fn record_settlement(
        &mut self,
        activity_id: ActivityId,
        user_id: UserId,
        status: ActivityStatus,
    ) -> LedgerResult<()> {
        let result = self.conn.execute(
            "INSERT INTO activity_settlements (activity_id, user_id, status, settled_at) VALUES (?1, ?2, ?3, ?4)",
            params![activity_id, user_id, status.as_str(), Utc::now().timestamp_millis()],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => Err(
                LedgerError::invalid(format!("activity {activity_id} was already settled")),
            ),
            Err(e) => Err(map_err(e)),
        }
    }
}

impl StoreTx for SqliteTx<'_> {
    fn insert_account(&mut self, account: &LedgerAccount) -> LedgerResult<()> {
        let result = self.conn.execute(
            r#"INSERT INTO accounts
               (user_id, username, locked_credits, unlocked_credits, pending_pool, version, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                account.user_id,
                account.username,
                account.locked_credits,
                account.unlocked_credits,
                account.pending_pool,
                account.version,
                Utc::now().timestamp_millis(),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                Err(LedgerError::invalid(format!(
                    "user {} already has an account",
                    account.user_id
                )))
            }
            Err(e) => Err(map_err(e)),
        }
    }

    fn accounts_by_credits(&mut self, limit: usize) -> LedgerResult<Vec<LedgerAccount>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY unlocked_credits DESC, user_id ASC LIMIT ?1"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&sql)?;
        let accounts = stmt
            .query_map([limit], account_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    fn count_accounts_above(&mut self, unlocked_credits: f64) -> LedgerResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE unlocked_credits > ?1",
            [unlocked_credits],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    fn activity(&mut self, id: ActivityId) -> LedgerResult<Option<ActivityRecord>> {
        let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id], activity_from_row)
            .optional()?)
    }

    fn activities(&mut self, user_id: UserId) -> LedgerResult<Vec<ActivityRecord>> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE user_id = ?1 ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let activities = stmt
            .query_map([user_id], activity_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(activities)
    }

    fn insert_activity(
        &mut self,
        new: &NewActivity,
        created_at: i64,
    ) -> LedgerResult<ActivityRecord> {
        let secs = i64::try_from(new.duration.total_seconds())
            .map_err(|_| LedgerError::invalid("duration too long"))?;
        self.conn
            .execute(
                r#"INSERT INTO activities (user_id, kind, duration_secs, status, description, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![
                    new.user_id,
                    new.kind,
                    secs,
                    ActivityStatus::Pending.as_str(),
                    new.description,
                    created_at,
                ],
            )
            .map_err(map_err)?;

        Ok(ActivityRecord {
            id: self.conn.last_insert_rowid(),
            user_id: new.user_id,
            kind: new.kind.clone(),
            duration: new.duration,
            status: ActivityStatus::Pending,
            description: new.description.clone(),
            created_at,
        })
    }

    fn set_activity_status(&mut self, id: ActivityId, status: ActivityStatus) -> LedgerResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE activities SET status = ?2 WHERE id = ?1",
                params![id, status.as_str()],
            )
            .map_err(map_err)?;
        if changed == 0 {
            return Err(LedgerError::UnknownActivity(id));
        }
        Ok(())
    }

    fn insert_item(
        &mut self,
        user_id: UserId,
        cost: f64,
        created_at: i64,
    ) -> LedgerResult<LockableItem> {
        self.conn
            .execute(
                "INSERT INTO lockable_items (user_id, cost, status, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, cost, ItemStatus::Locked.as_str(), created_at],
            )
            .map_err(map_err)?;
        Ok(LockableItem {
            id: self.conn.last_insert_rowid(),
            user_id,
            cost,
            status: ItemStatus::Locked,
            created_at,
        })
    }

    fn insert_reward(&mut self, new: &NewReward, created_at: i64) -> LedgerResult<Reward> {
        self.conn
            .execute(
                r#"INSERT INTO rewards (name, description, cost, category, available, popular, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    new.name,
                    new.description,
                    new.cost,
                    new.category,
                    new.available,
                    new.popular,
                    created_at,
                ],
            )
            .map_err(map_err)?;
        Ok(Reward {
            id: self.conn.last_insert_rowid(),
            name: new.name.clone(),
            description: new.description.clone(),
            cost: new.cost,
            category: new.category.clone(),
            available: new.available,
            popular: new.popular,
            created_at,
        })
    }

    fn reward(&mut self, id: RewardId) -> LedgerResult<Option<Reward>> {
        let sql = format!("SELECT {REWARD_COLUMNS} FROM rewards WHERE id = ?1");
        Ok(self.conn.query_row(&sql, [id], reward_from_row).optional()?)
    }

    fn rewards(&mut self) -> LedgerResult<Vec<Reward>> {
        let sql = format!("SELECT {REWARD_COLUMNS} FROM rewards ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rewards = stmt
            .query_map([], reward_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rewards)
    }

    fn insert_redemption(
        &mut self,
        user_id: UserId,
        reward_id: RewardId,
        cost: f64,
        redeemed_at: i64,
    ) -> LedgerResult<Redemption> {
        self.conn
            .execute(
                "INSERT INTO redemptions (user_id, reward_id, cost, redeemed_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, reward_id, cost, redeemed_at],
            )
            .map_err(map_err)?;
        Ok(Redemption {
            id: self.conn.last_insert_rowid(),
            user_id,
            reward_id,
            cost,
            redeemed_at,
        })
    }

    fn redemption_counts(&mut self) -> LedgerResult<BTreeMap<RewardId, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT reward_id, COUNT(*) FROM redemptions GROUP BY reward_id")?;
        let counts = stmt
            .query_map([], |r| Ok((r.get::<_, RewardId>(0)?, r.get::<_, i64>(1)? as u64)))?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(counts)
    }

    fn redemptions(&mut self, user_id: UserId) -> LedgerResult<Vec<Redemption>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, reward_id, cost, redeemed_at FROM redemptions
             WHERE user_id = ?1 ORDER BY redeemed_at DESC, id DESC",
        )?;
        let list = stmt
            .query_map([user_id], redemption_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(list)
    }

    fn insert_friendship(&mut self, user_id: UserId, friend_id: UserId) -> LedgerResult<()> {
        let now = Utc::now().timestamp_millis();
        for (a, b) in [(user_id, friend_id), (friend_id, user_id)] {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at) VALUES (?1, ?2, ?3)",
                    params![a, b, now],
                )
                .map_err(map_err)?;
        }
        Ok(())
    }

    fn friends(&mut self, user_id: UserId) -> LedgerResult<Vec<UserId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT friend_id FROM friendships WHERE user_id = ?1 ORDER BY friend_id")?;
        let friends = stmt
            .query_map([user_id], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<UserId>>>()?;
        Ok(friends)
    }

    fn audit_log(&mut self, user_id: Option<UserId>) -> LedgerResult<Vec<AuditRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, payload, recorded_at FROM audit_log
             WHERE ?1 IS NULL OR user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([user_id], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, payload, recorded_at)| {
                let event: AuditEvent = serde_json::from_str(&payload).map_err(|e| {
                    LedgerError::invalid(format!("corrupt audit entry {id}: {e}"))
                })?;
                Ok(AuditRecord {
                    id,
                    event,
                    recorded_at,
                })
            })
            .collect()
    }

    fn commit(mut self) -> LedgerResult<()> {
        self.conn.execute_batch("COMMIT").map_err(map_err)?;
        self.finished = true;
        Ok(())
    }
}

/// SQL schema for the ledger database
const SCHEMA_SQL: &str = r#"
-- One row per user
CREATE TABLE IF NOT EXISTS accounts (
    user_id INTEGER PRIMARY KEY,
    username TEXT NOT NULL,
    locked_credits REAL NOT NULL DEFAULT 0 CHECK (locked_credits >= 0),
    unlocked_credits REAL NOT NULL DEFAULT 0 CHECK (unlocked_credits >= 0),
    pending_pool REAL NOT NULL DEFAULT 0 CHECK (pending_pool >= 0),
    version INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

-- Logged activities and their verification status
CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES accounts(user_id),
    kind TEXT NOT NULL,
    duration_secs INTEGER NOT NULL CHECK (duration_secs >= 0),
    status TEXT NOT NULL DEFAULT 'PENDING',
    description TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_activity_user ON activities(user_id);

-- Unlock queue
CREATE TABLE IF NOT EXISTS lockable_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES accounts(user_id),
    cost REAL NOT NULL CHECK (cost > 0),
    status TEXT NOT NULL DEFAULT 'LOCKED',
    created_at INTEGER NOT NULL,
    unlocked_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_item_queue ON lockable_items(user_id, status, created_at, id);

-- Rewards store
CREATE TABLE IF NOT EXISTS rewards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    cost REAL NOT NULL CHECK (cost >= 0),
    category TEXT NOT NULL,
    available INTEGER NOT NULL DEFAULT 1,
    popular INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS redemptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES accounts(user_id),
    reward_id INTEGER NOT NULL REFERENCES rewards(id),
    cost REAL NOT NULL,
    redeemed_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_redemption_user ON redemptions(user_id);

-- Append-only audit trail (payload is the JSON-encoded event)
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    event TEXT NOT NULL,
    payload TEXT NOT NULL,
    recorded_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log(user_id);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_and_init() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        let store = SqliteStore::open(&db_path, Duration::from_millis(100)).unwrap();

        let conn = store.conn();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for table in ["accounts", "activities", "lockable_items", "rewards", "audit_log"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        {
            let store = SqliteStore::open(&db_path, Duration::from_millis(100)).unwrap();
            let mut tx = store.begin().unwrap();
            tx.insert_account(&LedgerAccount::new(1, "ada", 10.0)).unwrap();
            tx.commit().unwrap();
        }
        let store = SqliteStore::open(&db_path, Duration::from_millis(100)).unwrap();
        assert_eq!(store.schema_version().unwrap(), 4);
        let mut tx = store.begin().unwrap();
        assert_eq!(tx.account(1).unwrap().unwrap().username, "ada");
    }

    #[test]
    fn test_migrates_v1_items_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE accounts (
                user_id INTEGER PRIMARY KEY, username TEXT NOT NULL,
                locked_credits REAL NOT NULL DEFAULT 0, unlocked_credits REAL NOT NULL DEFAULT 0,
                pending_pool REAL NOT NULL DEFAULT 0, version INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE lockable_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER NOT NULL,
                cost REAL NOT NULL, status TEXT NOT NULL DEFAULT 'LOCKED', created_at INTEGER NOT NULL
            );
            CREATE TABLE schema_version (version INTEGER PRIMARY KEY);
            INSERT INTO schema_version VALUES (1);
            "#,
        )
        .unwrap();

        let store = SqliteStore::from_connection(conn, Duration::from_millis(100)).unwrap();
        assert_eq!(store.schema_version().unwrap(), 4);

        let mut tx = store.begin().unwrap();
        tx.insert_account(&LedgerAccount::new(1, "ada", 10.0)).unwrap();
        let item = tx.insert_item(1, 5.0, 1).unwrap();
        tx.mark_item_unlocked(item.id).unwrap();
        assert!(tx.locked_items(1).unwrap().is_empty());
    }

    #[test]
    fn test_oldest_locked_item_breaks_ties_by_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert_account(&LedgerAccount::new(1, "ada", 10.0)).unwrap();
        tx.insert_account(&LedgerAccount::new(2, "bob", 10.0)).unwrap();
        let late = tx.insert_item(1, 5.0, 200).unwrap();
        let tie_a = tx.insert_item(1, 5.0, 100).unwrap();
        let tie_b = tx.insert_item(1, 5.0, 100).unwrap();
        tx.insert_item(2, 5.0, 50).unwrap();

        let ids: Vec<ItemId> = tx.locked_items(1).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![tie_a.id, tie_b.id, late.id]);
        assert_eq!(tx.oldest_locked_item(1).unwrap().unwrap().id, tie_a.id);

        tx.mark_item_unlocked(tie_a.id).unwrap();
        assert_eq!(tx.oldest_locked_item(1).unwrap().unwrap().id, tie_b.id);
        assert!(tx.mark_item_unlocked(tie_a.id).is_err());
    }

    #[test]
    fn test_settlement_survives_commit_and_is_unique() {
        let store = SqliteStore::open_in_memory().unwrap();
        {
            let mut tx = store.begin().unwrap();
            tx.record_settlement(8, 1, ActivityStatus::Rejected).unwrap();
            tx.commit().unwrap();
        }
        let mut tx = store.begin().unwrap();
        assert_eq!(tx.settlement(8).unwrap(), Some(ActivityStatus::Rejected));
        assert_eq!(tx.settlement(9).unwrap(), None);
        let err = tx.record_settlement(8, 1, ActivityStatus::Verified).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_friends_and_redemption_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        for (id, name) in [(1, "ada"), (2, "bob"), (3, "cy")] {
            tx.insert_account(&LedgerAccount::new(id, name, 0.0)).unwrap();
        }
        tx.insert_friendship(1, 3).unwrap();
        tx.insert_friendship(3, 1).unwrap();
        tx.insert_friendship(2, 1).unwrap();
        assert_eq!(tx.friends(1).unwrap(), vec![2, 3]);
        assert_eq!(tx.friends(3).unwrap(), vec![1]);

        let mug = tx.insert_reward(&NewReward::new("Mug", 5.0, "merch"), 1).unwrap();
        let hat = tx.insert_reward(&NewReward::new("Hat", 5.0, "merch"), 1).unwrap();
        tx.insert_redemption(1, mug.id, 5.0, 2).unwrap();
        tx.insert_redemption(2, mug.id, 5.0, 3).unwrap();
        let counts = tx.redemption_counts().unwrap();
        assert_eq!(counts.get(&mug.id), Some(&2));
        assert_eq!(counts.get(&hat.id), None);
    }

    #[test]
    fn test_rollback_on_drop() {
        let store = SqliteStore::open_in_memory().unwrap();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_account(&LedgerAccount::new(1, "ada", 10.0)).unwrap();
        }
        let mut tx = store.begin().unwrap();
        assert!(tx.account(1).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_account_is_validation_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert_account(&LedgerAccount::new(1, "ada", 10.0)).unwrap();
        let err = tx.insert_account(&LedgerAccount::new(1, "bob", 10.0)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_audit_roundtrip_and_filter() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        tx.append_audit(&AuditEvent::ActivityRejected {
            user_id: 1,
            activity_id: 10,
        })
        .unwrap();
        tx.append_audit(&AuditEvent::RewardRedeemed {
            user_id: 2,
            reward_id: 3,
            cost: 40.0,
        })
        .unwrap();

        assert_eq!(tx.audit_log(None).unwrap().len(), 2);
        let mine = tx.audit_log(Some(2)).unwrap();
        assert_eq!(mine.len(), 1);
        assert!(matches!(mine[0].event, AuditEvent::RewardRedeemed { reward_id: 3, .. }));
    }
}
