//! Unit of Work
//!
//! Runs a closure against one freshly begun transaction and finishes the
//! transaction according to the closure's result:
//!
//! ```text
//! begin ──▶ work(&mut tx) ──Ok──▶ commit ──▶ Ok(value)
//!                  │
//!                 Err / timeout
//!                  ▼
//!              rollback ──Ok──▶ Err(original)
//!                  │
//!                 Err──▶ Err(RollbackFailed { original, rollback })
//! ```
//!
//! Nested units of work are not supported; `work` must issue every query
//! through the handle it is given.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use crate::error::{LedgerError, Result};
use crate::store::{LedgerStore, LedgerTx};

/// Run `work` inside one transaction with no deadline.
///
/// ```ignore
/// let account = run_in_transaction(&store, |tx| {
///     Box::pin(async move { tx.get_account(id).await })
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<S, T, F>(store: &S, work: F) -> Result<T>
where
    S: LedgerStore + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T>> + Send,
{
    run_in_transaction_with_timeout(store, None, work).await
}

/// Run `work` inside one transaction, giving up after `timeout`.
///
/// On timeout the in-flight work is dropped (releasing any lock wait) and the
/// transaction is rolled back before `LedgerError::Timeout` is returned.
pub async fn run_in_transaction_with_timeout<S, T, F>(
    store: &S,
    timeout: Option<Duration>,
    work: F,
) -> Result<T>
where
    S: LedgerStore + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T>> + Send,
{
    let mut tx = store.begin().await?;
    debug!(?timeout, "unit of work started");

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, work(&mut tx)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(limit)),
        },
        None => work(&mut tx).await,
    };

    match outcome {
        Ok(value) => {
            tx.commit().await?;
            debug!("unit of work committed");
            Ok(value)
        }
        Err(tx_err) => {
            warn!(error = %tx_err, "unit of work failed, rolling back");
            if let Err(rb_err) = tx.rollback().await {
                error!(error = %tx_err, rollback_error = %rb_err, "rollback failed");
                return Err(LedgerError::RollbackFailed {
                    tx_err: Box::new(tx_err),
                    rb_err: Box::new(rb_err),
                });
            }
            Err(tx_err)
        }
    }
}
