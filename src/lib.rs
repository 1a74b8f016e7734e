//! ecocredit - eco-credits ledger
//!
//! Users log activities; once a verifier accepts one, credits move from the
//! user's locked balance to their spendable eco-credits. Newly unlocked points
//! also fill a pending pool that buys queued items (e.g. coding sessions)
//! strictly in the order they were queued.
//!
//! ## Layers
//!
//! - [`engine`]: the credit unlock engine, run inside a caller's transaction
//! - [`store`]: the repository interface plus SQLite and in-memory adapters
//! - [`ledger`], [`rewards`], [`leaderboard`]: the caller layer, one store
//!   transaction per operation
//! - [`config`]: TOML configuration, including the multiplier table

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod ledger;
pub mod rewards;
pub mod store;

pub use domain::*;
pub use engine::{CreditUnlockEngine, Grant, UnlockOutcome};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use ledger::Ledger;
