//! Transfer request pre-checks
//!
//! These run in the calling layer, before [`TransferCoordinator::transfer`].
//! They read each account in its own short unit of work, so they are
//! advisory: a concurrent transfer can still change a balance afterwards.
//! Sufficient funds are deliberately not checked here either.

use serde::{Deserialize, Serialize};

use super::coordinator::TransferCoordinator;
use crate::core_types::{AccountId, Currency};
use crate::error::{LedgerError, Result};
use crate::models::{Account, TransferParams};
use crate::store::LedgerStore;

/// A transfer as requested by a client, tagged with the expected currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub currency: Currency,
}

impl From<TransferRequest> for TransferParams {
    fn from(req: TransferRequest) -> Self {
        TransferParams::new(req.from_account_id, req.to_account_id, req.amount)
    }
}

/// Check amount, distinct accounts, existence and currency.
///
/// Returns `(from_account, to_account)` as read during validation.
pub async fn validate_transfer<S: LedgerStore>(
    coordinator: &TransferCoordinator<S>,
    req: &TransferRequest,
) -> Result<(Account, Account)> {
    if req.amount <= 0 {
        return Err(LedgerError::InvalidAmount);
    }

    if req.from_account_id == req.to_account_id {
        return Err(LedgerError::SameAccount);
    }

    let from = valid_account(coordinator, req.from_account_id, req.currency).await?;
    let to = valid_account(coordinator, req.to_account_id, req.currency).await?;
    Ok((from, to))
}

async fn valid_account<S: LedgerStore>(
    coordinator: &TransferCoordinator<S>,
    account_id: AccountId,
    currency: Currency,
) -> Result<Account> {
    let account = coordinator.get_account(account_id).await?;
    if account.currency != currency {
        return Err(LedgerError::CurrencyMismatch {
            account_id,
            account: account.currency,
            requested: currency,
        });
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateAccountParams;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn setup() -> (TransferCoordinator<MemoryStore>, Account, Account, Account) {
        let coordinator = TransferCoordinator::new(Arc::new(MemoryStore::new()));
        let mut accounts = Vec::new();
        for currency in [Currency::Usd, Currency::Usd, Currency::Krw] {
            let account = coordinator
                .create_account(CreateAccountParams {
                    owner: "claire".to_string(),
                    balance: 100,
                    currency,
                })
                .await
                .unwrap();
            accounts.push(account);
        }
        let krw = accounts.pop().unwrap();
        let usd2 = accounts.pop().unwrap();
        let usd1 = accounts.pop().unwrap();
        (coordinator, usd1, usd2, krw)
    }

    fn request(from: &Account, to: &Account, amount: i64) -> TransferRequest {
        TransferRequest {
            from_account_id: from.id,
            to_account_id: to.id,
            amount,
            currency: Currency::Usd,
        }
    }

    #[tokio::test]
    async fn test_valid_request() {
        let (coordinator, a, b, _) = setup().await;
        let (from, to) = validate_transfer(&coordinator, &request(&a, &b, 10))
            .await
            .unwrap();
        assert_eq!(from.id, a.id);
        assert_eq!(to.id, b.id);
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let (coordinator, a, b, krw) = setup().await;

        let err = validate_transfer(&coordinator, &request(&a, &b, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount));

        let err = validate_transfer(&coordinator, &request(&a, &a, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SameAccount));

        let err = validate_transfer(&coordinator, &request(&a, &krw, 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::CurrencyMismatch {
                account: Currency::Krw,
                requested: Currency::Usd,
                ..
            }
        ));

        let mut missing = request(&a, &b, 10);
        missing.to_account_id = 404;
        let err = validate_transfer(&coordinator, &missing).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_request_into_params() {
        let req = TransferRequest {
            from_account_id: 1,
            to_account_id: 2,
            amount: 3,
            currency: Currency::Eur,
        };
        let params: TransferParams = req.into();
        assert_eq!(params, TransferParams::new(1, 2, 3));
    }
}
