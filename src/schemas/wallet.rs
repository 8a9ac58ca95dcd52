use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Wallet, WalletTransaction};
use crate::db::types::TransactionKind;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TopUpRequest {
    #[validate(range(exclusive_min = 0.0, message = "amount must be positive"))]
    pub(crate) amount: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct WalletResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) balance: f64,
    pub(crate) updated_at: String,
}

impl WalletResponse {
    pub(crate) fn from_db(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            user_id: wallet.user_id,
            balance: wallet.balance,
            updated_at: format_primitive(wallet.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WalletTransactionResponse {
    pub(crate) id: String,
    pub(crate) kind: TransactionKind,
    pub(crate) amount: f64,
    pub(crate) reason: String,
    pub(crate) source_id: Option<String>,
    pub(crate) created_at: String,
}

impl WalletTransactionResponse {
    pub(crate) fn from_db(transaction: WalletTransaction) -> Self {
        Self {
            id: transaction.id,
            kind: transaction.kind,
            amount: transaction.amount,
            reason: transaction.reason,
            source_id: transaction.source_id,
            created_at: format_primitive(transaction.created_at),
        }
    }
}
