//! Ledger Error Types
//!
//! One error enum for the store, the unit-of-work runner and the transfer
//! coordinator. Calling layers map [`LedgerError::code`] onto their own
//! response format.

use std::time::Duration;

use thiserror::Error;

use crate::core_types::{AccountId, Currency};

#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    // === Lookup Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    // === Request Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and target account cannot be the same")]
    SameAccount,

    #[error(
        "account [{account_id}] currency mismatch: the currency of the account is {account} while the currency of the transfer is {requested}"
    )]
    CurrencyMismatch {
        account_id: AccountId,
        account: Currency,
        requested: Currency,
    },

    // === System Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unit of work timed out after {0:?}")]
    Timeout(Duration),

    #[error("Injected failure: {0}")]
    Injected(String),

    #[error("tx err: {tx_err}, rb err: {rb_err}")]
    RollbackFailed {
        tx_err: Box<LedgerError>,
        rb_err: Box<LedgerError>,
    },
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Stable error code for calling layers
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::SameAccount => "SAME_ACCOUNT",
            LedgerError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            LedgerError::Database(_) => "DATABASE_ERROR",
            LedgerError::Timeout(_) => "TIMEOUT",
            LedgerError::Injected(_) => "INJECTED_FAILURE",
            LedgerError::RollbackFailed { .. } => "ROLLBACK_FAILED",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound(_))
    }
}

/// Postgres SQLSTATE for `foreign_key_violation`
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => LedgerError::NotFound(e.to_string()),
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
            {
                LedgerError::NotFound(db_err.message().to_string())
            }
            _ => LedgerError::Database(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
