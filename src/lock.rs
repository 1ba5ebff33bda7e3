//! Per-user lock registry.
//!
//! One exclusive lock per user id, created lazily on first reference and kept
//! for the life of the registry. Locks for different users never contend.

use crate::error::{PointError, Result};
use dashmap::DashMap;
use log::trace;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::sync::Arc;
use std::time::Duration;

/// Held lock on one user's balance. Released when dropped.
pub struct UserLockGuard {
    user_id: u64,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl UserLockGuard {
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Releases the lock, unblocking the next waiter.
    pub fn release(self) {
        drop(self);
    }
}

/// Maps user ids to their exclusive locks.
///
/// Entries are never evicted: users are assumed to be bounded and long-lived.
#[derive(Default)]
pub struct LockRegistry {
    locks: DashMap<u64, Arc<Mutex<()>>>,
    timeout: Option<Duration>,
}

impl LockRegistry {
    /// Creates a registry whose `acquire` waits without bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry whose `acquire` gives up after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        LockRegistry {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Blocks until the lock for `user_id` is free, then holds it.
    ///
    /// Fails with `LockTimeout` only when a timeout is configured.
    pub fn acquire(&self, user_id: u64) -> Result<UserLockGuard> {
        // Clone the Arc so the map shard is not held while we block.
        let lock = self.lock_for(user_id);

        let guard = match self.timeout {
            None => lock.lock_arc(),
            Some(timeout) => lock.try_lock_arc_for(timeout).ok_or(PointError::LockTimeout {
                user_id,
                waited_ms: timeout.as_millis(),
            })?,
        };

        trace!("Acquired lock for user {}", user_id);
        Ok(UserLockGuard {
            user_id,
            _guard: guard,
        })
    }

    /// Number of users that have a lock registered.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn lock_for(&self, user_id: u64) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
