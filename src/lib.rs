//! # Point Ledger
//!
//! A per-user point balance engine. Balances are charged and used
//! concurrently from many threads, and every mutation is recorded as an
//! immutable history entry.
//!
//! ## Design Principles
//!
//! - **Per-user serialization**: one lock per user id; different users never contend
//! - **Atomic steps**: balance write and history append happen under the same lock
//! - **Strict bounds**: `0 <= point <= i64::MAX` always holds
//! - **No partial writes**: rejected operations leave balance and history untouched
//!
//! ## Example
//!
//! ```
//! use point_ledger::PointEngine;
//!
//! let engine = PointEngine::in_memory();
//! engine.charge(1, 100).unwrap();
//! engine.use_points(1, 30).unwrap();
//!
//! assert_eq!(engine.balance(1).unwrap().point, 70);
//! assert_eq!(engine.history(1).unwrap().len(), 2);
//! ```

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod lock;
pub mod point;
pub mod store;

pub use command::{ChargeCommand, CommandRecord, FindCommand, PointCommand, UseCommand};
pub use config::EngineConfig;
pub use engine::{InMemoryEngine, Outcome, PointEngine};
pub use error::{ErrorCategory, ErrorKind, PointError, Result, StoreError};
pub use history::{NewHistory, PointHistory, TransactionType};
pub use lock::{LockRegistry, UserLockGuard};
pub use point::{UserPoint, MAX_POINT};
pub use store::{HistoryLog, InMemoryHistoryLog, InMemoryPointStore, PointStore, StoreResult};
