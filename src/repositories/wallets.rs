use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Wallet, WalletTransaction};
use crate::db::types::TransactionKind;

const COLUMNS: &str = "id, user_id, balance, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, wallet_id, kind, amount, reason, source_id, created_at";

pub(crate) async fn ensure_wallet(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO wallets (id, user_id, balance, created_at, updated_at)
         VALUES ($1, $2, 0, $3, $3)
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_user(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as::<_, Wallet>(&format!("SELECT {COLUMNS} FROM wallets WHERE user_id = $1"))
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// Conditional debit; returns `false` when the wallet is missing or the
/// balance would go negative. Run inside the caller's transaction so the
/// balance check and the spend commit together.
pub(crate) async fn debit(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    amount: f64,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE wallets SET balance = balance - $2, updated_at = $3
         WHERE user_id = $1 AND balance >= $2",
    )
    .bind(user_id)
    .bind(amount)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn credit(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    amount: f64,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE wallets SET balance = balance + $2, updated_at = $3 WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(amount)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) struct CreateTransaction<'a> {
    pub(crate) wallet_id: &'a str,
    pub(crate) kind: TransactionKind,
    pub(crate) amount: f64,
    pub(crate) reason: &'a str,
    pub(crate) source_id: Option<&'a str>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn record_transaction(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateTransaction<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO wallet_transactions (
            id, wallet_id, kind, amount, reason, source_id, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(params.wallet_id)
    .bind(params.kind)
    .bind(params.amount)
    .bind(params.reason)
    .bind(params.source_id)
    .bind(params.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_transactions(
    pool: &PgPool,
    wallet_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<WalletTransaction>, sqlx::Error> {
    sqlx::query_as::<_, WalletTransaction>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions
         WHERE wallet_id = $1 ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(wallet_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}
