use super::{matches_query, read_body, read_data};
use crate::error::{ClientError, Result};
use crate::http_client::{ApiRequest, SecureClient};
use crate::models::wallet::{
    BalanceAdjustment, Transaction, TransactionKind, TransactionPage, WalletBalance,
};
use reqwest::Method;

pub async fn wallet_balances(client: &SecureClient) -> Result<Vec<WalletBalance>> {
    read_data(client.get("/wallet/allUser/balance").await?).await
}

/// Increase or decrease a user's balance. Rejected locally unless the
/// amount is positive and a reason is given.
pub async fn adjust_balance(
    client: &SecureClient,
    user_id: &str,
    adjustment: &BalanceAdjustment,
) -> Result<()> {
    if adjustment.amount.is_nan() || adjustment.amount <= 0.0 {
        return Err(ClientError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    if adjustment.reason.trim().is_empty() {
        return Err(ClientError::Validation("reason is required".to_string()));
    }

    tracing::info!(
        user_id = user_id,
        amount = adjustment.amount,
        operation = ?adjustment.operation,
        "Adjusting wallet balance"
    );

    let response = client
        .patch(&format!("/wallet/admin/adjust/{}", user_id), adjustment)
        .await?;
    read_body(response).await?;
    Ok(())
}

/// Admin transaction ledger filtered by status (e.g. `completed`)
pub async fn transactions(client: &SecureClient, status: &str) -> Result<TransactionPage> {
    let request = ApiRequest::new(Method::GET, "/wallet/admin/all-transactions")
        .with_query("status", status);
    read_data(client.request(request).await?).await
}

/// Wallets whose owner's name or email contains `query`
pub fn filter_wallets<'a>(wallets: &'a [WalletBalance], query: &str) -> Vec<&'a WalletBalance> {
    wallets
        .iter()
        .filter(|w| {
            let owner = w.user_id.as_ref();
            matches_query(
                &[
                    owner.and_then(|u| u.name.as_deref()),
                    owner.and_then(|u| u.email.as_deref()),
                ],
                query,
            )
        })
        .collect()
}

/// Transaction list filter: kind plus owner name/email search
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub query: String,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(kind) = self.kind {
            if tx.kind != kind {
                return false;
            }
        }

        matches_query(
            &[tx.user_id.name.as_deref(), tx.user_id.email.as_deref()],
            &self.query,
        )
    }

    pub fn apply<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        transactions.iter().filter(|tx| self.matches(tx)).collect()
    }
}

/// Number of pages needed for `total` items
pub fn total_pages(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page)
}

/// One page of `items`, 1-based; out-of-range pages are empty
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    if page == 0 || per_page == 0 {
        return &[];
    }

    let start = (page - 1).saturating_mul(per_page);
    if start >= items.len() {
        return &[];
    }
    let end = (start + per_page).min(items.len());
    &items[start..end]
}
