//! In-memory ledger store
//!
//! Behaves like the Postgres store where it matters for transfers:
//!
//! - ids come from per-table sequences, assigned at insert time (rolled back
//!   inserts leave gaps)
//! - `add_account_balance` takes an exclusive row lock and holds it until the
//!   transaction commits, rolls back or is dropped
//! - writes stay private to the transaction until commit
//! - inserts referencing a missing account fail with `NotFound`, like a
//!   foreign key violation
//!
//! There is no deadlock detector. Two transactions that lock the same rows in
//! opposite order wait on each other until a timeout drops one of them.
//!
//! Fault injection ([`MemoryStore::fail_at`]) makes a chosen operation fail,
//! so atomicity can be checked without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::{debug, trace};

use super::{LedgerStore, LedgerTx, Queries};
use crate::core_types::{AccountId, EntryId, TransferId};
use crate::error::{LedgerError, Result};
use crate::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListParams, ListTransfersParams, Transfer,
};

/// Store operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateAccount,
    CreateTransfer,
    CreateEntry,
    AddAccountBalance,
    Commit,
    Rollback,
}

/// Number of committed rows per table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub accounts: usize,
    pub entries: usize,
    pub transfers: usize,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<EntryId, Entry>,
    transfers: BTreeMap<TransferId, Transfer>,
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<AccountId, Arc<RowLock<()>>>>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
    /// FailPoint -> number of calls still allowed to succeed before failing
    faults: Mutex<HashMap<FailPoint, u32>>,
    balance_log: Mutex<Vec<AccountId>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // No code path panics while holding these locks; recover if a test did.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn row_lock(&self, id: AccountId) -> Arc<RowLock<()>> {
        guard(&self.row_locks).entry(id).or_default().clone()
    }

    fn check_fault(&self, point: FailPoint) -> Result<()> {
        let mut faults = guard(&self.faults);
        if let Some(remaining) = faults.get_mut(&point) {
            if *remaining == 0 {
                faults.remove(&point);
                return Err(LedgerError::Injected(format!("{point:?}")));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

/// In-process ledger store with row-level locking
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `point` fail with `LedgerError::Injected`
    pub fn fail_at(&self, point: FailPoint) {
        self.fail_at_nth(point, 1);
    }

    /// Make the `nth` (1-based) next call of `point` fail. Earlier calls succeed.
    pub fn fail_at_nth(&self, point: FailPoint, nth: u32) {
        guard(&self.shared.faults).insert(point, nth.saturating_sub(1));
    }

    pub fn clear_faults(&self) {
        guard(&self.shared.faults).clear();
    }

    /// Account ids in the order their balance increments were applied,
    /// across all transactions (committed or not)
    pub fn balance_update_log(&self) -> Vec<AccountId> {
        guard(&self.shared.balance_log).clone()
    }

    pub fn clear_balance_update_log(&self) {
        guard(&self.shared.balance_log).clear();
    }

    pub fn row_counts(&self) -> RowCounts {
        let tables = guard(&self.shared.tables);
        RowCounts {
            accounts: tables.accounts.len(),
            entries: tables.entries.len(),
            transfers: tables.transfers.len(),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        Ok(MemoryTx {
            shared: Arc::clone(&self.shared),
            accounts: BTreeMap::new(),
            pending_balances: HashMap::new(),
            entries: BTreeMap::new(),
            transfers: BTreeMap::new(),
            locks: HashMap::new(),
        })
    }
}

/// Open transaction on a [`MemoryStore`]. Row locks are released on drop.
pub struct MemoryTx {
    shared: Arc<Shared>,
    /// Accounts inserted by this transaction
    accounts: BTreeMap<AccountId, Account>,
    /// Post-update balances of rows this transaction has locked
    pending_balances: HashMap<AccountId, i64>,
    entries: BTreeMap<EntryId, Entry>,
    transfers: BTreeMap<TransferId, Transfer>,
    locks: HashMap<AccountId, OwnedMutexGuard<()>>,
}

impl MemoryTx {
    /// Account as seen by this transaction: base row with own updates
    fn visible_account(&self, id: AccountId) -> Option<Account> {
        let mut account = match self.accounts.get(&id) {
            Some(account) => account.clone(),
            None => guard(&self.shared.tables).accounts.get(&id)?.clone(),
        };
        if let Some(balance) = self.pending_balances.get(&id) {
            account.balance = *balance;
        }
        Some(account)
    }

    fn account_exists(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id) || guard(&self.shared.tables).accounts.contains_key(&id)
    }

    fn require_account(&self, id: AccountId) -> Result<()> {
        if self.account_exists(id) {
            Ok(())
        } else {
            Err(LedgerError::not_found(format!("account {id}")))
        }
    }

    async fn lock_row(&mut self, id: AccountId) {
        if self.locks.contains_key(&id) {
            return;
        }
        let lock = self.shared.row_lock(id);
        trace!(account_id = id, "waiting for row lock");
        let held = lock.lock_owned().await;
        self.locks.insert(id, held);
    }
}

/// Apply offset/limit. Negative values fail, as `LIMIT -1` does in Postgres.
fn page<T>(rows: impl Iterator<Item = T>, params: ListParams) -> Result<Vec<T>> {
    let offset = usize::try_from(params.offset).map_err(|_| {
        LedgerError::database(format!("OFFSET must not be negative: {}", params.offset))
    })?;
    let limit = usize::try_from(params.limit).map_err(|_| {
        LedgerError::database(format!("LIMIT must not be negative: {}", params.limit))
    })?;
    Ok(rows.skip(offset).take(limit).collect())
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn commit(mut self) -> Result<()> {
        self.shared.check_fault(FailPoint::Commit)?;

        let mut tables = guard(&self.shared.tables);
        tables.accounts.append(&mut self.accounts);
        // Row locks are still held, so nobody else changed these rows.
        for (id, balance) in self.pending_balances.drain() {
            if let Some(account) = tables.accounts.get_mut(&id) {
                account.balance = balance;
            }
        }
        tables.entries.append(&mut self.entries);
        tables.transfers.append(&mut self.transfers);
        drop(tables);

        debug!(locks = self.locks.len(), "memory transaction committed");
        // Row locks are released when `self` drops, after the writes are visible.
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.shared.check_fault(FailPoint::Rollback)?;
        debug!(locks = self.locks.len(), "memory transaction rolled back");
        Ok(())
    }
}

#[async_trait]
impl Queries for MemoryTx {
    async fn create_account(&mut self, params: &CreateAccountParams) -> Result<Account> {
        self.shared.check_fault(FailPoint::CreateAccount)?;

        let account = Account {
            id: self.shared.account_seq.fetch_add(1, Ordering::SeqCst) + 1,
            owner: params.owner.clone(),
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account> {
        self.visible_account(id)
            .ok_or_else(|| LedgerError::not_found(format!("account {id}")))
    }

    async fn list_accounts(&mut self, params: ListParams) -> Result<Vec<Account>> {
        let mut ids: Vec<AccountId> = guard(&self.shared.tables).accounts.keys().copied().collect();
        ids.extend(self.accounts.keys().copied());
        ids.sort_unstable();

        let visible: Vec<Account> = ids
            .into_iter()
            .filter_map(|id| self.visible_account(id))
            .collect();
        page(visible.into_iter(), params)
    }

    async fn add_account_balance(&mut self, params: AddAccountBalanceParams) -> Result<Account> {
        self.shared.check_fault(FailPoint::AddAccountBalance)?;
        self.require_account(params.id)?;

        self.lock_row(params.id).await;

        let current = self
            .visible_account(params.id)
            .ok_or_else(|| LedgerError::not_found(format!("account {}", params.id)))?;
        let updated = current.balance.checked_add(params.amount).ok_or_else(|| {
            LedgerError::database(format!("balance out of range for account {}", params.id))
        })?;

        self.pending_balances.insert(params.id, updated);
        guard(&self.shared.balance_log).push(params.id);

        Ok(Account {
            balance: updated,
            ..current
        })
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        self.shared.check_fault(FailPoint::CreateEntry)?;
        self.require_account(params.account_id)?;

        let entry = Entry {
            id: self.shared.entry_seq.fetch_add(1, Ordering::SeqCst) + 1,
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry> {
        if let Some(entry) = self.entries.get(&id) {
            return Ok(entry.clone());
        }
        guard(&self.shared.tables)
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("entry {id}")))
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        params: ListParams,
    ) -> Result<Vec<Entry>> {
        let tables = guard(&self.shared.tables);
        let mut entries: Vec<Entry> = tables
            .entries
            .values()
            .chain(self.entries.values())
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        drop(tables);

        entries.sort_by_key(|e| e.id);
        page(entries.into_iter(), params)
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        self.shared.check_fault(FailPoint::CreateTransfer)?;
        self.require_account(params.from_account_id)?;
        self.require_account(params.to_account_id)?;

        let transfer = Transfer {
            id: self.shared.transfer_seq.fetch_add(1, Ordering::SeqCst) + 1,
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer> {
        if let Some(transfer) = self.transfers.get(&id) {
            return Ok(transfer.clone());
        }
        guard(&self.shared.tables)
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("transfer {id}")))
    }

    async fn list_transfers(&mut self, params: ListTransfersParams) -> Result<Vec<Transfer>> {
        let tables = guard(&self.shared.tables);
        let mut transfers: Vec<Transfer> = tables
            .transfers
            .values()
            .chain(self.transfers.values())
            .filter(|t| {
                t.from_account_id == params.from_account_id
                    || t.to_account_id == params.to_account_id
            })
            .cloned()
            .collect();
        drop(tables);

        transfers.sort_by_key(|t| t.id);
        page(
            transfers.into_iter(),
            ListParams {
                limit: params.limit,
                offset: params.offset,
            },
        )
    }
}
