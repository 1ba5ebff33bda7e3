//! User point balance model and arithmetic.
//!
//! Balances are immutable snapshots: every charge or use produces a new
//! `UserPoint` that supersedes the previous one.

use crate::error::{PointError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest balance a user may hold (the maximum signed 64-bit value).
pub const MAX_POINT: u64 = i64::MAX as u64;

/// A snapshot of one user's point balance.
///
/// # Invariants
///
/// - `user_id >= 1`
/// - `point <= MAX_POINT`
/// - `updated_at` is not before the Unix epoch and never moves backwards
///   between successive snapshots of the same user
///
/// Deserialized values go through [`UserPoint::new`], so these hold for
/// snapshots read back from storage as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawUserPoint")]
pub struct UserPoint {
    /// Account owner.
    pub user_id: u64,

    /// Current point total.
    pub point: u64,

    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl UserPoint {
    /// Creates a validated balance snapshot.
    pub fn new(user_id: u64, point: u64, updated_at: DateTime<Utc>) -> Result<Self> {
        if user_id < 1 {
            return Err(PointError::InvalidUserId(0));
        }

        if point > MAX_POINT {
            return Err(PointError::InvalidAmount(point.into()));
        }

        if updated_at.timestamp_millis() < 0 {
            return Err(PointError::InvalidTimestamp(updated_at));
        }

        Ok(UserPoint {
            user_id,
            point,
            updated_at,
        })
    }

    /// Zero balance for a user that has never transacted.
    pub fn empty(user_id: u64) -> Self {
        UserPoint {
            user_id,
            point: 0,
            updated_at: Utc::now(),
        }
    }

    /// Returns the balance after charging `amount`.
    ///
    /// Fails with `ExceedsMaximum` if the result would pass [`MAX_POINT`].
    pub fn charged(&self, amount: u64, now: DateTime<Utc>) -> Result<Self> {
        if MAX_POINT - self.point < amount {
            return Err(PointError::ExceedsMaximum {
                user_id: self.user_id,
                balance: self.point,
                requested: amount,
            });
        }

        Ok(self.with_point(self.point + amount, now))
    }

    /// Returns the balance after spending `amount`.
    ///
    /// Fails with `InsufficientBalance` if `amount` is more than the balance.
    pub fn used(&self, amount: u64, now: DateTime<Utc>) -> Result<Self> {
        if self.point < amount {
            return Err(PointError::InsufficientBalance {
                user_id: self.user_id,
                balance: self.point,
                requested: amount,
            });
        }

        Ok(self.with_point(self.point - amount, now))
    }

    fn with_point(&self, point: u64, now: DateTime<Utc>) -> Self {
        UserPoint {
            user_id: self.user_id,
            point,
            // Clock skew must not make a user's updates appear out of order.
            updated_at: now.max(self.updated_at),
        }
    }
}

/// Unvalidated wire form of [`UserPoint`].
#[derive(Deserialize)]
struct RawUserPoint {
    user_id: u64,
    point: u64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RawUserPoint> for UserPoint {
    type Error = PointError;

    fn try_from(raw: RawUserPoint) -> Result<Self> {
        UserPoint::new(raw.user_id, raw.point, raw.updated_at)
    }
}
