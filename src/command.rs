//! Validated commands and their CSV representation.
//!
//! Raw ids and amounts arrive as signed integers. They are checked here, once,
//! before the engine runs; the engine itself assumes valid input.

use crate::error::{PointError, Result};
use serde::Deserialize;

fn validate_user_id(user_id: i64) -> Result<u64> {
    if user_id < 1 {
        return Err(PointError::InvalidUserId(user_id));
    }
    Ok(user_id as u64)
}

fn validate_amount(amount: i64) -> Result<u64> {
    if amount < 1 {
        return Err(PointError::InvalidAmount(amount.into()));
    }
    Ok(amount as u64)
}

/// Request to add points to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeCommand {
    pub user_id: u64,
    pub amount: u64,
}

impl ChargeCommand {
    pub fn new(user_id: i64, amount: i64) -> Result<Self> {
        Ok(ChargeCommand {
            user_id: validate_user_id(user_id)?,
            amount: validate_amount(amount)?,
        })
    }
}

/// Request to spend points of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseCommand {
    pub user_id: u64,
    pub amount: u64,
}

impl UseCommand {
    pub fn new(user_id: i64, amount: i64) -> Result<Self> {
        Ok(UseCommand {
            user_id: validate_user_id(user_id)?,
            amount: validate_amount(amount)?,
        })
    }
}

/// Lookup of a user's balance or history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindCommand {
    pub user_id: u64,
}

impl FindCommand {
    pub fn new(user_id: i64) -> Result<Self> {
        Ok(FindCommand {
            user_id: validate_user_id(user_id)?,
        })
    }
}

/// Any command the engine can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointCommand {
    Charge(ChargeCommand),
    Use(UseCommand),
    Balance(FindCommand),
    History(FindCommand),
}

impl PointCommand {
    pub fn user_id(&self) -> u64 {
        match self {
            PointCommand::Charge(c) => c.user_id,
            PointCommand::Use(c) => c.user_id,
            PointCommand::Balance(c) | PointCommand::History(c) => c.user_id,
        }
    }
}

/// Raw command as read from CSV: `type,user,amount`.
///
/// `amount` is only present for `charge` and `use`.
#[derive(Debug, Deserialize)]
pub struct CommandRecord {
    #[serde(rename = "type")]
    pub cmd_type: String,

    pub user: i64,

    pub amount: Option<i64>,
}

impl CommandRecord {
    /// Parses and validates the record at `row`.
    pub fn parse(&self, row: usize) -> Result<PointCommand> {
        let cmd_type = self.cmd_type.trim().to_lowercase();

        match cmd_type.as_str() {
            "charge" => Ok(PointCommand::Charge(ChargeCommand::new(
                self.user,
                self.require_amount(row)?,
            )?)),
            "use" => Ok(PointCommand::Use(UseCommand::new(
                self.user,
                self.require_amount(row)?,
            )?)),
            "balance" => Ok(PointCommand::Balance(FindCommand::new(self.user)?)),
            "history" => Ok(PointCommand::History(FindCommand::new(self.user)?)),
            other => Err(PointError::InvalidRecord {
                row,
                message: format!("unknown command type '{}'", other),
            }),
        }
    }

    fn require_amount(&self, row: usize) -> Result<i64> {
        self.amount.ok_or_else(|| PointError::InvalidRecord {
            row,
            message: format!("'{}' requires an amount", self.cmd_type.trim()),
        })
    }
}
