//! Transaction history records.

use crate::error::{PointError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a completed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Points were added to the balance.
    Charge,

    /// Points were spent from the balance.
    Use,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Charge => write!(f, "CHARGE"),
            TransactionType::Use => write!(f, "USE"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "charge" => Ok(TransactionType::Charge),
            "use" => Ok(TransactionType::Use),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

/// A history record that has not been appended yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistory {
    pub user_id: u64,
    pub amount: u64,
    pub tx_type: TransactionType,
    pub timestamp: DateTime<Utc>,
}

impl NewHistory {
    /// Creates an unsaved record. `user_id` and `amount` must both be at least 1
    /// and `timestamp` must not predate the Unix epoch.
    pub fn new(
        user_id: u64,
        amount: u64,
        tx_type: TransactionType,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        if user_id < 1 {
            return Err(PointError::InvalidUserId(0));
        }

        if amount < 1 {
            return Err(PointError::InvalidAmount(0));
        }

        if timestamp.timestamp_millis() < 0 {
            return Err(PointError::InvalidTimestamp(timestamp));
        }

        Ok(NewHistory {
            user_id,
            amount,
            tx_type,
            timestamp,
        })
    }

    /// Turns this record into a stored one with the id assigned by a log.
    pub fn into_record(self, id: u64) -> Result<PointHistory> {
        if id < 1 {
            return Err(PointError::InvalidHistoryId(id));
        }

        Ok(PointHistory {
            id,
            user_id: self.user_id,
            amount: self.amount,
            tx_type: self.tx_type,
            timestamp: self.timestamp,
        })
    }
}

/// One completed charge or use. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointHistory {
    /// Log-assigned id, increasing in append order.
    pub id: u64,

    /// Account affected.
    pub user_id: u64,

    /// Magnitude of the transaction. The sign is carried by `tx_type`.
    pub amount: u64,

    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    /// Equals the `updated_at` of the balance snapshot this record documents.
    pub timestamp: DateTime<Utc>,
}
