//! PostgreSQL ledger store
//!
//! Expects the `accounts`, `entries` and `transfers` tables to exist.
//! Entries and transfers reference `accounts(id)` through foreign keys;
//! a violation surfaces as `LedgerError::NotFound`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};

use super::{LedgerStore, LedgerTx, Queries};
use crate::core_types::{AccountId, Currency, EntryId, TransferId};
use crate::db::Database;
use crate::error::{LedgerError, Result};
use crate::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListParams, ListTransfersParams, Transfer,
};

/// Ledger store backed by a Postgres connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn from_database(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::database(format!("failed to begin transaction: {e}")))?;
        Ok(PgTx { tx })
    }
}

/// One Postgres transaction. sqlx rolls it back if dropped uncommitted.
pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Queries for PgTx {
    async fn create_account(&mut self, params: &CreateAccountParams) -> Result<Account> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (owner, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&params.owner)
        .bind(params.balance)
        .bind(params.currency.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_account(&row)
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE id = $1
            LIMIT 1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(LedgerError::not_found(format!("account {id}"))),
        }
    }

    async fn list_accounts(&mut self, params: ListParams) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_account).collect()
    }

    async fn add_account_balance(&mut self, params: AddAccountBalanceParams) -> Result<Account> {
        // Single statement: Postgres takes the row lock and increments in place.
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + $1
            WHERE id = $2
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(params.amount)
        .bind(params.id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(LedgerError::not_found(format!("account {}", params.id))),
        }
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        let row = sqlx::query(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_entry(&row)
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE id = $1
            LIMIT 1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_entry(&row),
            None => Err(LedgerError::not_found(format!("entry {id}"))),
        }
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        params: ListParams,
    ) -> Result<Vec<Entry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        let row = sqlx::query(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_transfer(&row)
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer> {
        let row = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE id = $1
            LIMIT 1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_transfer(&row),
            None => Err(LedgerError::not_found(format!("transfer {id}"))),
        }
    }

    async fn list_transfers(&mut self, params: ListTransfersParams) -> Result<Vec<Transfer>> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE from_account_id = $1 OR to_account_id = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_transfer).collect()
    }
}

fn row_to_account(row: &PgRow) -> Result<Account> {
    let currency: String = row.try_get("currency")?;
    let currency: Currency = currency.parse().map_err(|e| {
        LedgerError::database(format!("invalid currency in accounts row: {e}"))
    })?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(Account {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        balance: row.try_get("balance")?,
        currency,
        created_at,
    })
}

fn row_to_entry(row: &PgRow) -> Result<Entry> {
    Ok(Entry {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_transfer(row: &PgRow) -> Result<Transfer> {
    Ok(Transfer {
        id: row.try_get("id")?,
        from_account_id: row.try_get("from_account_id")?,
        to_account_id: row.try_get("to_account_id")?,
        amount: row.try_get("amount")?,
        created_at: row.try_get("created_at")?,
    })
}
