//! Ledger Transfer - atomic funds transfers over a double-entry ledger
//!
//! # Modules
//!
//! - [`core_types`] - Ids and currency
//! - [`models`] - Account, Entry and Transfer records plus query params
//! - [`error`] - Ledger error taxonomy
//! - [`store`] - Ledger store contract, PostgreSQL and in-memory backends
//! - [`transfer`] - Unit-of-work runner, transfer coordinator, pre-checks
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL connection pool

// Core types - must be first!
pub mod core_types;

pub mod error;
pub mod models;

// Persistence
pub mod db;
pub mod store;

// Transfer engine
pub mod transfer;

// Ambient
pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{AccountId, Currency, EntryId, TransferId};
pub use error::{LedgerError, Result};
pub use models::{
    Account, CreateAccountParams, Entry, ListParams, ListTransfersParams, Transfer,
    TransferParams, TransferResult,
};
pub use store::{LedgerStore, LedgerTx, MemoryStore, PgStore, Queries};
pub use transfer::{TransferCoordinator, TransferRequest, run_in_transaction, validate_transfer};
