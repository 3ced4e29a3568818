use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserRef;

/// Per-user wallet as listed by `/wallet/allUser/balance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<UserRef>,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub total_deposited: f64,
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceOperation {
    Increase,
    Decrease,
}

/// Admin balance adjustment body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceAdjustment {
    pub amount: f64,
    pub operation: BalanceOperation,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Deduct,
}

/// Wallet snapshot populated into a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRef {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: UserRef,
    #[serde(default)]
    pub wallet_id: Option<WalletRef>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default)]
    pub balance_before: f64,
    #[serde(default)]
    pub balance_after: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub reference_type: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub meta: PageMeta,
    pub transactions: Vec<Transaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transaction_deserialize() {
        let tx: Transaction = serde_json::from_value(json!({
            "_id": "t1",
            "userId": { "_id": "u1", "name": "Karim", "email": "k@example.com", "phone": "017" },
            "walletId": { "_id": "w1", "balance": 450 },
            "type": "deduct",
            "amount": 50,
            "balanceBefore": 500,
            "balanceAfter": 450,
            "description": "Meal charge",
            "referenceId": null,
            "referenceType": "meal",
            "month": "2026-01",
            "status": "completed",
            "transactionId": null,
            "gatewayResponse": null,
            "createdAt": "2026-01-16T09:30:00.000Z"
        }))
        .unwrap();

        assert_eq!(tx.kind, TransactionKind::Deduct);
        assert_eq!(tx.user_id.name.as_deref(), Some("Karim"));
        assert_eq!(tx.wallet_id.and_then(|w| w.balance), Some(450.0));
    }

    #[test]
    fn test_adjustment_serialize() {
        let body = serde_json::to_value(BalanceAdjustment {
            amount: 200.0,
            operation: BalanceOperation::Decrease,
            reason: "Correction".to_string(),
        })
        .unwrap();
        assert_eq!(
            body,
            json!({ "amount": 200.0, "operation": "decrease", "reason": "Correction" })
        );
    }
}
