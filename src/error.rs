//! Error types for ledger operations
//!
//! Every failure surfaces as a typed [`LedgerError`]. Nothing in the ledger
//! turns a failure into a default value or a message string.

use crate::domain::{ActivityId, RewardId, UserId};

/// Result alias used throughout the ledger core
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Coarse classification of a [`LedgerError`], used by callers to decide
/// whether an operation may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conservation,
    Storage,
    Concurrency,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No ledger account for user {0}")]
    UnknownAccount(UserId),

    #[error("No activity with id {0}")]
    UnknownActivity(ActivityId),

    #[error("No reward with id {0}")]
    UnknownReward(RewardId),

    #[error("Reward {0} is not available")]
    RewardUnavailable(RewardId),

    #[error("Insufficient eco-credits for user {user_id}: need {required}, have {available}")]
    InsufficientCredits {
        user_id: UserId,
        required: f64,
        available: f64,
    },

    #[error(
        "Credit conservation violated for user {user_id}: total {before} -> {after} (locked {locked}, unlocked {unlocked}, pool {pool})"
    )]
    ConservationViolation {
        user_id: UserId,
        before: f64,
        after: f64,
        locked: f64,
        unlocked: f64,
        pool: f64,
    },

    #[error("Concurrent ledger update (account {user_id:?}), retry the operation")]
    ConcurrencyConflict { user_id: Option<UserId> },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::UnknownAccount(_)
            | Self::UnknownActivity(_)
            | Self::UnknownReward(_)
            | Self::RewardUnavailable(_)
            | Self::InsufficientCredits { .. } => ErrorKind::Validation,
            Self::ConservationViolation { .. } => ErrorKind::Conservation,
            Self::ConcurrencyConflict { .. } => ErrorKind::Concurrency,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether the caller may safely retry the whole operation
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Concurrency
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(LedgerError::UnknownAccount(7).kind(), ErrorKind::Validation);
        assert_eq!(
            LedgerError::ConcurrencyConflict { user_id: Some(1) }.kind(),
            ErrorKind::Concurrency
        );
        assert!(LedgerError::ConcurrencyConflict { user_id: None }.is_retryable());
        assert!(!LedgerError::invalid("bad duration").is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = LedgerError::InsufficientCredits {
            user_id: 3,
            required: 50.0,
            available: 12.5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient eco-credits for user 3: need 50, have 12.5"
        );
    }
}
