//! Core balance mutation engine.
//!
//! Charges and uses against one user are serialized through that user's lock.
//! The lock is held across the balance read, the balance write and the
//! history append, so operations on the same user never interleave. Operations
//! on different users proceed independently.

use crate::command::{CommandRecord, PointCommand};
use crate::config::EngineConfig;
use crate::error::{ErrorCategory, PointError, Result};
use crate::history::{NewHistory, PointHistory, TransactionType};
use crate::lock::LockRegistry;
use crate::point::UserPoint;
use crate::store::{HistoryLog, InMemoryHistoryLog, InMemoryPointStore, PointStore};
use chrono::{SecondsFormat, Utc};
use csv::{ReaderBuilder, Trim};
use log::{debug, error, warn};
use std::io::{Read, Write};

/// Result of applying a [`PointCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Balance(UserPoint),
    History(Vec<PointHistory>),
}

/// Engine over the in-memory tables, as used by the CLI.
pub type InMemoryEngine = PointEngine<InMemoryPointStore, InMemoryHistoryLog>;

/// The point balance engine.
///
/// Sole writer of balances and history records. It does not own their
/// storage, only the sequencing of writes into it. Share it between threads
/// with an `Arc`.
pub struct PointEngine<S, H> {
    store: S,
    history: H,
    locks: LockRegistry,
}

impl InMemoryEngine {
    /// Creates an engine over empty in-memory tables.
    pub fn in_memory() -> Self {
        PointEngine::new(InMemoryPointStore::new(), InMemoryHistoryLog::new())
    }

    /// Applies commands from a CSV reader in streaming fashion.
    ///
    /// Invalid rows and rejected commands are logged at warn level and
    /// skipped. Storage failures abort processing.
    pub fn process_csv<R: Read>(&self, reader: R) -> Result<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<CommandRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Row {}: CSV parse error: {}", row_num, e);
                    continue;
                }
            };

            let outcome = record.parse(row_num).and_then(|cmd| self.apply(cmd));
            match outcome {
                Ok(Outcome::Balance(point)) => {
                    debug!("Row {}: user {} has {} points", row_num, point.user_id, point.point)
                }
                Ok(Outcome::History(records)) => {
                    debug!("Row {}: {} history records", row_num, records.len())
                }
                Err(e) if e.kind().category() == ErrorCategory::Infrastructure => return Err(e),
                // Already logged by the engine.
                Err(e) if e.is_domain() => {}
                Err(e) => warn!("Row {}: {}", row_num, e),
            }
        }

        Ok(())
    }

    /// Writes final balances as CSV, sorted by user id.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["user", "point"])?;
        for point in self.store.all() {
            csv_writer.write_record([point.user_id.to_string(), point.point.to_string()])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes every history record as CSV, in append order.
    pub fn write_history<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "user", "type", "amount", "timestamp"])?;
        for record in self.history.all() {
            csv_writer.write_record([
                record.id.to_string(),
                record.user_id.to_string(),
                record.tx_type.to_string(),
                record.amount.to_string(),
                record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl<S: PointStore, H: HistoryLog> PointEngine<S, H> {
    /// Creates an engine with unbounded lock waits.
    pub fn new(store: S, history: H) -> Self {
        Self::with_config(store, history, EngineConfig::default())
    }

    pub fn with_config(store: S, history: H, config: EngineConfig) -> Self {
        PointEngine {
            store,
            history,
            locks: LockRegistry::with_timeout(config.lock_timeout),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn history_log(&self) -> &H {
        &self.history
    }

    /// Adds `amount` points to `user_id`, creating the account at zero if needed.
    ///
    /// Fails with `ExceedsMaximum` without writing anything if the new balance
    /// would pass [`MAX_POINT`](crate::point::MAX_POINT).
    pub fn charge(&self, user_id: u64, amount: u64) -> Result<UserPoint> {
        self.mutate(user_id, amount, TransactionType::Charge, |current| {
            current
                .unwrap_or_else(|| UserPoint::empty(user_id))
                .charged(amount, Utc::now())
        })
    }

    /// Spends `amount` points of `user_id`.
    ///
    /// Fails with `AccountNotFound` if the user has never been charged and
    /// with `InsufficientBalance` if the balance is less than `amount`.
    pub fn use_points(&self, user_id: u64, amount: u64) -> Result<UserPoint> {
        self.mutate(user_id, amount, TransactionType::Use, |current| {
            current
                .ok_or(PointError::AccountNotFound { user_id })?
                .used(amount, Utc::now())
        })
    }

    /// Current balance of `user_id`. A user that never transacted has zero.
    ///
    /// Not serialized with concurrent writes.
    pub fn balance(&self, user_id: u64) -> Result<UserPoint> {
        ensure_user_id(user_id)?;
        let point = self.store.find_by_id(user_id)?;
        Ok(point.unwrap_or_else(|| UserPoint::empty(user_id)))
    }

    /// History of `user_id` in append order.
    pub fn history(&self, user_id: u64) -> Result<Vec<PointHistory>> {
        ensure_user_id(user_id)?;
        Ok(self.history.list_by_user(user_id)?)
    }

    /// Dispatches a validated command.
    pub fn apply(&self, command: PointCommand) -> Result<Outcome> {
        match command {
            PointCommand::Charge(c) => self.charge(c.user_id, c.amount).map(Outcome::Balance),
            PointCommand::Use(c) => self.use_points(c.user_id, c.amount).map(Outcome::Balance),
            PointCommand::Balance(c) => self.balance(c.user_id).map(Outcome::Balance),
            PointCommand::History(c) => self.history(c.user_id).map(Outcome::History),
        }
    }

    /// Read, compute, write and append under the user's lock.
    ///
    /// `update` receives the stored balance (if any) and returns the new one,
    /// or a domain error in which case nothing is written.
    fn mutate<F>(
        &self,
        user_id: u64,
        amount: u64,
        tx_type: TransactionType,
        update: F,
    ) -> Result<UserPoint>
    where
        F: FnOnce(Option<UserPoint>) -> Result<UserPoint>,
    {
        ensure_user_id(user_id)?;
        if amount < 1 {
            return Err(PointError::InvalidAmount(0));
        }

        let result = self.locked_update(user_id, amount, tx_type, update);

        match &result {
            Ok(point) => debug!(
                "{} {} for user {}, balance now {}",
                tx_type, amount, user_id, point.point
            ),
            Err(e) if e.is_domain() => {
                warn!("{} {} for user {} rejected: {}", tx_type, amount, user_id, e)
            }
            Err(e) => error!("{} {} for user {} failed: {}", tx_type, amount, user_id, e),
        }

        result
    }

    fn locked_update<F>(
        &self,
        user_id: u64,
        amount: u64,
        tx_type: TransactionType,
        update: F,
    ) -> Result<UserPoint>
    where
        F: FnOnce(Option<UserPoint>) -> Result<UserPoint>,
    {
        // Dropped on every return path below, releasing the user.
        let guard = self.locks.acquire(user_id)?;

        let current = self.store.find_by_id(user_id)?;
        let updated = update(current)?;
        let saved = self.store.save(updated)?;

        // A failed append after a successful save is surfaced, not rolled back.
        let record = NewHistory::new(user_id, amount, tx_type, saved.updated_at)?;
        let record = self.history.append(record)?;
        debug!("Appended history {} for user {}", record.id, user_id);

        guard.release();
        Ok(saved)
    }
}

fn ensure_user_id(user_id: u64) -> Result<()> {
    if user_id < 1 {
        return Err(PointError::InvalidUserId(0));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::MAX_POINT;
    use std::io::Cursor;

    fn engine_with_balance(user_id: u64, point: u64) -> InMemoryEngine {
        let engine = PointEngine::in_memory();
        engine
            .store()
            .save(UserPoint::new(user_id, point, Utc::now()).unwrap())
            .unwrap();
        engine
    }

    fn process_csv_str(csv: &str) -> InMemoryEngine {
        let engine = PointEngine::in_memory();
        engine.process_csv(Cursor::new(csv)).unwrap();
        engine
    }

    #[test]
    fn test_charge_existing_balance() {
        let engine = engine_with_balance(1, 50);

        let result = engine.charge(1, 100).unwrap();
        assert_eq!(result.user_id, 1);
        assert_eq!(result.point, 150);
        assert_eq!(engine.balance(1).unwrap().point, 150);

        let history = engine.history(1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_type, TransactionType::Charge);
        assert_eq!(history[0].amount, 100);
        assert_eq!(history[0].timestamp, result.updated_at);
    }

    #[test]
    fn test_charge_creates_account() {
        let engine = PointEngine::in_memory();
        assert_eq!(engine.charge(9, 30).unwrap().point, 30);
        assert_eq!(engine.balance(9).unwrap().point, 30);
    }

    #[test]
    fn test_use_reduces_balance() {
        let engine = engine_with_balance(1, 150);

        let result = engine.use_points(1, 100).unwrap();
        assert_eq!(result.point, 50);

        let history = engine.history(1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_type, TransactionType::Use);
        assert_eq!(history[0].amount, 100);
    }

    #[test]
    fn test_use_insufficient_balance_leaves_state() {
        let engine = engine_with_balance(1, 50);

        let err = engine.use_points(1, 100).unwrap_err();
        assert!(matches!(err, PointError::InsufficientBalance { .. }));
        assert_eq!(engine.balance(1).unwrap().point, 50);
        assert!(engine.history(1).unwrap().is_empty());
    }

    #[test]
    fn test_use_without_account_fails() {
        let engine = PointEngine::in_memory();
        let err = engine.use_points(1, 1).unwrap_err();
        assert!(matches!(err, PointError::AccountNotFound { user_id: 1 }));
        assert!(engine.store().find_by_id(1).unwrap().is_none());
    }

    #[test]
    fn test_charge_at_maximum_fails() {
        let engine = engine_with_balance(1, MAX_POINT);

        let err = engine.charge(1, 1).unwrap_err();
        assert!(matches!(err, PointError::ExceedsMaximum { .. }));
        assert_eq!(engine.balance(1).unwrap().point, MAX_POINT);
        assert!(engine.history(1).unwrap().is_empty());
    }

    #[test]
    fn test_zero_amount_is_rejected_before_locking() {
        let engine = PointEngine::in_memory();
        assert!(matches!(
            engine.charge(1, 0),
            Err(PointError::InvalidAmount(0))
        ));
        assert!(engine.store().find_by_id(1).unwrap().is_none());
    }

    #[test]
    fn test_reads_reject_zero_user_id() {
        let engine = PointEngine::in_memory();
        assert!(matches!(
            engine.balance(0),
            Err(PointError::InvalidUserId(0))
        ));
        assert!(matches!(
            engine.history(0),
            Err(PointError::InvalidUserId(0))
        ));
        assert!(matches!(
            engine.use_points(0, 1),
            Err(PointError::InvalidUserId(0))
        ));
    }

    #[test]
    fn test_balance_of_unknown_user_is_zero() {
        let engine = PointEngine::in_memory();
        let point = engine.balance(77).unwrap();
        assert_eq!(point.user_id, 77);
        assert_eq!(point.point, 0);
        assert!(engine.history(77).unwrap().is_empty());
    }

    #[test]
    fn test_failed_operation_releases_lock() {
        let engine = engine_with_balance(1, 10);
        assert!(engine.use_points(1, 100).is_err());
        // Would block forever if the failed use had kept the lock.
        assert_eq!(engine.charge(1, 5).unwrap().point, 15);
    }

    #[test]
    fn test_apply_dispatches_commands() {
        use crate::command::{ChargeCommand, FindCommand, UseCommand};

        let engine = PointEngine::in_memory();
        engine
            .apply(PointCommand::Charge(ChargeCommand::new(1, 40).unwrap()))
            .unwrap();
        engine
            .apply(PointCommand::Use(UseCommand::new(1, 15).unwrap()))
            .unwrap();

        let balance = engine
            .apply(PointCommand::Balance(FindCommand::new(1).unwrap()))
            .unwrap();
        match balance {
            Outcome::Balance(point) => assert_eq!(point.point, 25),
            other => panic!("Expected Balance, got {:?}", other),
        }

        let history = engine
            .apply(PointCommand::History(FindCommand::new(1).unwrap()))
            .unwrap();
        match history {
            Outcome::History(records) => assert_eq!(records.len(), 2),
            other => panic!("Expected History, got {:?}", other),
        }
    }

    #[test]
    fn test_process_csv_skips_rejected_rows() {
        let csv = r#"type,user,amount
charge,1,100
use,1,30
use,1,500
use,2,10
charge,0,10
charge,2,-5
refund,1,1
balance,1,"#;

        let engine = process_csv_str(csv);
        assert_eq!(engine.balance(1).unwrap().point, 70);
        assert!(engine.store().find_by_id(2).unwrap().is_none());
        assert_eq!(engine.history(1).unwrap().len(), 2);
    }

    #[test]
    fn test_whitespace_handling() {
        let csv = r#"type, user, amount
charge, 1, 10
use, 1, 3"#;

        let engine = process_csv_str(csv);
        assert_eq!(engine.balance(1).unwrap().point, 7);
    }

    #[test]
    fn test_output_format() {
        let csv = r#"type,user,amount
charge,2,20
charge,1,10"#;

        let engine = process_csv_str(csv);
        let mut output = Vec::new();
        engine.write_output(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(output_str, "user,point\n1,10\n2,20\n");
    }

    #[test]
    fn test_history_output_format() {
        let csv = r#"type,user,amount
charge,1,10
use,1,4"#;

        let engine = process_csv_str(csv);
        let mut output = Vec::new();
        engine.write_history(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output_str.lines().collect();
        assert_eq!(lines[0], "id,user,type,amount,timestamp");
        assert!(lines[1].starts_with("1,1,CHARGE,10,"));
        assert!(lines[2].starts_with("2,1,USE,4,"));
    }
}
