//! Balance store and history log collaborators.
//!
//! The engine only sequences writes into these; it does not own their
//! storage. The in-memory implementations are the reference backends used by
//! the CLI and the tests.

use crate::error::StoreError;
use crate::history::{NewHistory, PointHistory};
use crate::point::UserPoint;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Keyed storage of the current balance per user.
///
/// `save` has overwrite (last-write-wins) semantics. Callers are responsible
/// for serializing read-modify-write sequences on the same user.
pub trait PointStore: Send + Sync {
    fn find_by_id(&self, user_id: u64) -> StoreResult<Option<UserPoint>>;

    fn save(&self, point: UserPoint) -> StoreResult<UserPoint>;
}

/// Append-only log of completed transactions.
pub trait HistoryLog: Send + Sync {
    /// Appends a record and returns it with its assigned id.
    fn append(&self, record: NewHistory) -> StoreResult<PointHistory>;

    /// Returns a user's records in append order.
    fn list_by_user(&self, user_id: u64) -> StoreResult<Vec<PointHistory>>;
}

/// In-memory balance table.
#[derive(Default)]
pub struct InMemoryPointStore {
    points: RwLock<HashMap<u64, UserPoint>>,
    latency: Option<Duration>,
}

impl InMemoryPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a slow backend by sleeping on every access.
    pub fn with_latency(latency: Duration) -> Self {
        InMemoryPointStore {
            points: RwLock::new(HashMap::new()),
            latency: Some(latency),
        }
    }

    /// Returns every stored balance, sorted by user id.
    pub fn all(&self) -> Vec<UserPoint> {
        let mut points: Vec<_> = self.points.read().values().cloned().collect();
        points.sort_by_key(|p| p.user_id);
        points
    }

    fn throttle(&self) {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
    }
}

impl PointStore for InMemoryPointStore {
    fn find_by_id(&self, user_id: u64) -> StoreResult<Option<UserPoint>> {
        self.throttle();
        Ok(self.points.read().get(&user_id).cloned())
    }

    fn save(&self, point: UserPoint) -> StoreResult<UserPoint> {
        self.throttle();
        self.points.write().insert(point.user_id, point.clone());
        Ok(point)
    }
}

/// In-memory history table shared by all users.
///
/// Ids are assigned under the same lock as the append, so they are globally
/// unique and strictly increasing in append order.
#[derive(Default)]
pub struct InMemoryHistoryLog {
    records: Mutex<Vec<PointHistory>>,
    latency: Option<Duration>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a slow backend by sleeping on every access.
    pub fn with_latency(latency: Duration) -> Self {
        InMemoryHistoryLog {
            records: Mutex::new(Vec::new()),
            latency: Some(latency),
        }
    }

    /// Returns every record across all users in append order.
    pub fn all(&self) -> Vec<PointHistory> {
        self.records.lock().clone()
    }

    fn throttle(&self) {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
    }
}

impl HistoryLog for InMemoryHistoryLog {
    fn append(&self, record: NewHistory) -> StoreResult<PointHistory> {
        self.throttle();
        let mut records = self.records.lock();
        let id = records.len() as u64 + 1;
        let stored = record
            .into_record(id)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        records.push(stored.clone());
        Ok(stored)
    }

    fn list_by_user(&self, user_id: u64) -> StoreResult<Vec<PointHistory>> {
        self.throttle();
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
