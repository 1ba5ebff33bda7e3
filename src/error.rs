//! Error types for the point ledger.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, PointError>;

/// Errors raised by a balance store or history log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing storage could not be reached
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while operating on point balances.
#[derive(Error, Debug)]
pub enum PointError {
    /// User id was not a positive identifier
    #[error("Invalid user id: {0}")]
    InvalidUserId(i64),

    /// Amount was not a positive integer, or a balance was out of range
    #[error("Invalid amount: {0}")]
    InvalidAmount(i128),

    /// Timestamp on a balance or record predates the Unix epoch
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(DateTime<Utc>),

    /// History id assigned by a log was not positive
    #[error("Invalid history id: {0}")]
    InvalidHistoryId(u64),

    /// Spending from a user that has never been charged
    #[error("No point account for user {user_id}")]
    AccountNotFound { user_id: u64 },

    /// Spending more than the current balance
    #[error("Insufficient balance for user {user_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        user_id: u64,
        balance: u64,
        requested: u64,
    },

    /// Charging past the maximum representable balance
    #[error("Balance for user {user_id} would exceed the maximum: balance {balance}, requested {requested}")]
    ExceedsMaximum {
        user_id: u64,
        balance: u64,
        requested: u64,
    },

    /// Balance store or history log failure
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Timed out waiting for a user's lock
    #[error("Timed out after {waited_ms}ms waiting for the lock of user {user_id}")]
    LockTimeout { user_id: u64, waited_ms: u128 },

    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid command record
    #[error("Invalid command at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Missing input file argument
    #[error("Missing input file argument. Usage: point-ledger <commands.csv> [--history]")]
    MissingArgument,
}

/// Coarse classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected at the boundary before the engine runs.
    Validation,
    /// Deterministic outcome of the current balance. Never retried.
    Domain,
    /// Storage, locking or I/O failure.
    Infrastructure,
}

/// Stable, machine-readable error kind.
///
/// The request layer maps these to transport status codes; the codes
/// themselves never change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUserId,
    InvalidAmount,
    InvalidTimestamp,
    InvalidHistoryId,
    InvalidRecord,
    AccountNotFound,
    InsufficientBalance,
    ExceedsMaximum,
    LockTimeout,
    Infrastructure,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUserId => "INVALID_USER_ID",
            ErrorKind::InvalidAmount => "INVALID_AMOUNT",
            ErrorKind::InvalidTimestamp => "INVALID_TIMESTAMP",
            ErrorKind::InvalidHistoryId => "INVALID_HISTORY_ID",
            ErrorKind::InvalidRecord => "INVALID_RECORD",
            ErrorKind::AccountNotFound => "ACCOUNT_NOT_FOUND",
            ErrorKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorKind::ExceedsMaximum => "EXCEEDS_MAXIMUM",
            ErrorKind::LockTimeout => "LOCK_TIMEOUT",
            ErrorKind::Infrastructure => "INFRASTRUCTURE",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::InvalidUserId
            | ErrorKind::InvalidAmount
            | ErrorKind::InvalidTimestamp
            | ErrorKind::InvalidHistoryId
            | ErrorKind::InvalidRecord => ErrorCategory::Validation,
            ErrorKind::AccountNotFound
            | ErrorKind::InsufficientBalance
            | ErrorKind::ExceedsMaximum => ErrorCategory::Domain,
            ErrorKind::LockTimeout | ErrorKind::Infrastructure => ErrorCategory::Infrastructure,
        }
    }
}

impl PointError {
    /// Returns the stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PointError::InvalidUserId(_) => ErrorKind::InvalidUserId,
            PointError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            PointError::InvalidTimestamp(_) => ErrorKind::InvalidTimestamp,
            PointError::InvalidHistoryId(_) => ErrorKind::InvalidHistoryId,
            PointError::InvalidRecord { .. } | PointError::MissingArgument => {
                ErrorKind::InvalidRecord
            }
            PointError::AccountNotFound { .. } => ErrorKind::AccountNotFound,
            PointError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            PointError::ExceedsMaximum { .. } => ErrorKind::ExceedsMaximum,
            PointError::LockTimeout { .. } => ErrorKind::LockTimeout,
            PointError::Store(_) | PointError::Io(_) | PointError::Csv(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Returns `true` for the deterministic balance rejections.
    pub fn is_domain(&self) -> bool {
        self.kind().category() == ErrorCategory::Domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_are_classified() {
        let err = PointError::InsufficientBalance {
            user_id: 1,
            balance: 50,
            requested: 100,
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert_eq!(err.kind().code(), "INSUFFICIENT_BALANCE");
        assert!(err.is_domain());

        assert!(PointError::AccountNotFound { user_id: 1 }.is_domain());
        assert!(!PointError::InvalidAmount(0).is_domain());
    }

    #[test]
    fn test_store_error_is_infrastructure() {
        let err: PointError = StoreError::Unavailable("disk gone".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.kind().category(), ErrorCategory::Infrastructure);
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn test_messages_carry_context() {
        let err = PointError::ExceedsMaximum {
            user_id: 7,
            balance: 10,
            requested: 20,
        };
        let message = err.to_string();
        assert!(message.contains("user 7"));
        assert!(message.contains("requested 20"));
    }
}
