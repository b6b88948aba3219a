//! Ledger Store
//!
//! The store is a passive data layer. Every query runs against an explicit
//! transaction handle handed out by [`LedgerStore::begin`]; there is no
//! ambient connection that queries silently share.
//!
//! # Implementations
//!
//! - [`PgStore`] - PostgreSQL via `sqlx`, row locks taken by `UPDATE`
//! - [`MemoryStore`] - in-process tables with per-row async locks held until
//!   commit/rollback, plus fault injection for tests
//!
//! # Balance Invariant
//!
//! `accounts.balance` is only changed by [`Queries::add_account_balance`],
//! which increments in place while holding the row lock. Application code
//! never reads a balance and writes back a computed value.

pub mod memory;
pub mod postgres;

pub use memory::{FailPoint, MemoryStore, MemoryTx, RowCounts};
pub use postgres::{PgStore, PgTx};

use async_trait::async_trait;

use crate::core_types::{AccountId, EntryId, TransferId};
use crate::error::Result;
use crate::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListParams, ListTransfersParams, Transfer,
};

/// Typed queries bound to one open transaction
#[async_trait]
pub trait Queries: Send {
    // === Accounts ===

    async fn create_account(&mut self, params: &CreateAccountParams) -> Result<Account>;

    /// Returns `NotFound` if the account does not exist
    async fn get_account(&mut self, id: AccountId) -> Result<Account>;

    async fn list_accounts(&mut self, params: ListParams) -> Result<Vec<Account>>;

    /// Atomically add `params.amount` to the balance and return the updated row.
    ///
    /// Takes the row lock and keeps it until the transaction ends, so
    /// concurrent increments on the same account serialize.
    async fn add_account_balance(&mut self, params: AddAccountBalanceParams) -> Result<Account>;

    // === Entries ===

    /// Returns `NotFound` if `account_id` does not reference an account
    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry>;

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry>;

    async fn list_entries(&mut self, account_id: AccountId, params: ListParams)
    -> Result<Vec<Entry>>;

    // === Transfers ===

    /// Returns `NotFound` if either side does not reference an account
    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer>;

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer>;

    async fn list_transfers(&mut self, params: ListTransfersParams) -> Result<Vec<Transfer>>;
}

/// An open transaction. Dropping it without `commit` discards every write.
#[async_trait]
pub trait LedgerTx: Queries {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Source of transactions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    /// Begin a new transaction. Fails with `Database` if no connection is available.
    async fn begin(&self) -> Result<Self::Tx>;
}
