//! Core types used throughout the system
//!
//! Identifiers are plain `i64` aliases because they are assigned by the store
//! (Postgres `BIGSERIAL`) and compared numerically for lock ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account ID - assigned by the store on insert, never reused.
///
/// # Ordering
/// Two account IDs are compared as raw integers to decide which row
/// lock a transfer acquires first. Nothing else about the value matters.
pub type AccountId = i64;

/// Entry ID - one leg of a transfer
pub type EntryId = i64;

/// Transfer ID
pub type TransferId = i64;

/// Supported account currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Krw,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Krw];

    /// ISO 4217 code as stored in `accounts.currency`
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Krw => "KRW",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a currency code is not one of [`Currency::ALL`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "KRW" => Ok(Currency::Krw),
            other => Err(UnknownCurrency(other.to_string())),
        }
    }
}
