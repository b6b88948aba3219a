//! Transfer Coordinator
//!
//! Records a transfer and moves the money inside one unit of work.
//! The coordinator holds no locks and no mutable state; all mutual exclusion
//! comes from the store's row locks, acquired in account-id order.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::unit_of_work::run_in_transaction_with_timeout;
use crate::core_types::{AccountId, EntryId, TransferId};
use crate::error::{LedgerError, Result};
use crate::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListParams, ListTransfersParams, Transfer, TransferParams,
    TransferResult,
};
use crate::store::{LedgerStore, Queries};

/// Transfer Coordinator - runs transfers against a shared store
///
/// Cheap to share: wrap in an `Arc` or clone the store handle and build one
/// per task. Safe to call concurrently from any number of tasks.
pub struct TransferCoordinator<S> {
    store: Arc<S>,
    timeout: Option<Duration>,
}

impl<S: LedgerStore> TransferCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bound every unit of work started by this coordinator
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Move `amount` from one account to another.
    ///
    /// Creates the transfer record and both entries, then applies the two
    /// balance increments. Either everything commits or nothing does.
    ///
    /// # Caller responsibilities
    /// Does not check that the accounts differ, that they share a currency,
    /// or that the source has enough funds. Balances may go negative.
    /// See [`super::validation::validate_transfer`].
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult> {
        if params.amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let result =
            run_in_transaction_with_timeout(self.store.as_ref(), self.timeout, move |tx| {
                Box::pin(async move { execute_transfer(tx, params).await })
            })
            .await?;

        info!(
            transfer_id = result.transfer.id,
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount,
            from_balance = result.from_account.balance,
            to_balance = result.to_account.balance,
            "Transfer committed"
        );
        Ok(result)
    }

    // === Single-query units of work ===

    pub async fn create_account(&self, params: CreateAccountParams) -> Result<Account> {
        run_in_transaction_with_timeout(self.store.as_ref(), self.timeout, move |tx| {
            Box::pin(async move { tx.create_account(&params).await })
        })
        .await
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        run_in_transaction_with_timeout(self.store.as_ref(), self.timeout, move |tx| {
            Box::pin(async move { tx.get_account(id).await })
        })
        .await
    }

    pub async fn list_accounts(&self, params: ListParams) -> Result<Vec<Account>> {
        run_in_transaction_with_timeout(self.store.as_ref(), self.timeout, move |tx| {
            Box::pin(async move { tx.list_accounts(params).await })
        })
        .await
    }

    pub async fn get_entry(&self, id: EntryId) -> Result<Entry> {
        run_in_transaction_with_timeout(self.store.as_ref(), self.timeout, move |tx| {
            Box::pin(async move { tx.get_entry(id).await })
        })
        .await
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        params: ListParams,
    ) -> Result<Vec<Entry>> {
        run_in_transaction_with_timeout(self.store.as_ref(), self.timeout, move |tx| {
            Box::pin(async move { tx.list_entries(account_id, params).await })
        })
        .await
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer> {
        run_in_transaction_with_timeout(self.store.as_ref(), self.timeout, move |tx| {
            Box::pin(async move { tx.get_transfer(id).await })
        })
        .await
    }

    pub async fn list_transfers(&self, params: ListTransfersParams) -> Result<Vec<Transfer>> {
        run_in_transaction_with_timeout(self.store.as_ref(), self.timeout, move |tx| {
            Box::pin(async move { tx.list_transfers(params).await })
        })
        .await
    }
}

impl<S> Clone for TransferCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            timeout: self.timeout,
        }
    }
}

/// The body of a transfer, run against an open transaction
async fn execute_transfer<Q: Queries>(
    q: &mut Q,
    params: TransferParams,
) -> Result<TransferResult> {
    let transfer = q
        .create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let from_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await?;

    let to_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let (from_account, to_account) = move_money(
        q,
        params.from_account_id,
        params.to_account_id,
        params.amount,
    )
    .await?;

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Debit `from` and credit `to`, locking the lower account id first.
///
/// Every transfer between the same two accounts, in either direction,
/// requests the two row locks in the same order, so no two of them can
/// each hold one lock while waiting for the other.
///
/// Returns `(from_account, to_account)` as they are after both updates.
/// `amount` must be positive; anything else is `InvalidAmount`.
pub async fn move_money<Q: Queries>(
    q: &mut Q,
    from_account_id: AccountId,
    to_account_id: AccountId,
    amount: i64,
) -> Result<(Account, Account)> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount);
    }

    if from_account_id < to_account_id {
        debug!(first = from_account_id, second = to_account_id, "debit first");
        let from_account = add_money(q, from_account_id, -amount).await?;
        let to_account = add_money(q, to_account_id, amount).await?;
        Ok((from_account, to_account))
    } else {
        debug!(first = to_account_id, second = from_account_id, "credit first");
        let to_account = add_money(q, to_account_id, amount).await?;
        let from_account = add_money(q, from_account_id, -amount).await?;
        Ok((from_account, to_account))
    }
}

async fn add_money<Q: Queries>(q: &mut Q, id: AccountId, amount: i64) -> Result<Account> {
    q.add_account_balance(AddAccountBalanceParams { id, amount })
        .await
}
