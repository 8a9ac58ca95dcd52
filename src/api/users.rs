use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::TransactionKind;
use crate::repositories;
use crate::schemas::user::{AdminUserCreate, UserResponse};
use crate::schemas::wallet::{TopUpRequest, WalletResponse, WalletTransactionResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/me/wallet", get(my_wallet))
        .route("/me/wallet/transactions", get(my_transactions))
        .route("/:user_id", get(get_user))
        .route("/:user_id/wallet/topup", post(top_up_wallet))
}

async fn list_users(
    Query(params): Query<PageQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let users = repositories::users::list(state.db(), params.skip, params.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;
    let total_count = repositories::users::count(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;

    Ok(Json(PaginatedResponse {
        items: users.into_iter().map(UserResponse::from_db).collect(),
        total_count,
        skip: params.skip,
        limit: params.limit,
    }))
}

async fn create_user(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminUserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let email = payload.email.trim().to_ascii_lowercase();

    let existing = repositories::users::exists_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("User with this email already exists".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let now = primitive_now_utc();
    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            email: &email,
            hashed_password,
            full_name: &payload.full_name,
            role: payload.role,
            is_active: payload.is_active,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create user"))?;

    repositories::wallets::ensure_wallet(state.db(), &user.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create wallet"))?;

    Ok((StatusCode::CREATED, Json(UserResponse::from_db(user))))
}

async fn get_user(
    Path(user_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from_db(user)))
}

async fn my_wallet(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<WalletResponse>, ApiError> {
    let wallet = repositories::wallets::find_by_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch wallet"))?
        .ok_or_else(|| ApiError::NotFound("Wallet not found".to_string()))?;

    Ok(Json(WalletResponse::from_db(wallet)))
}

async fn my_transactions(
    Query(params): Query<PageQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<WalletTransactionResponse>>, ApiError> {
    let wallet = repositories::wallets::find_by_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch wallet"))?
        .ok_or_else(|| ApiError::NotFound("Wallet not found".to_string()))?;

    let transactions =
        repositories::wallets::list_transactions(state.db(), &wallet.id, params.skip, params.limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list transactions"))?;

    Ok(Json(transactions.into_iter().map(WalletTransactionResponse::from_db).collect()))
}

async fn top_up_wallet(
    Path(user_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<TopUpRequest>,
) -> Result<Json<WalletResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let credited = repositories::wallets::credit(&mut *tx, &user_id, payload.amount, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to credit wallet"))?;
    if !credited {
        return Err(ApiError::NotFound("Wallet not found".to_string()));
    }

    let wallet = repositories::wallets::find_by_user(&mut *tx, &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch wallet"))?
        .ok_or_else(|| ApiError::NotFound("Wallet not found".to_string()))?;

    repositories::wallets::record_transaction(
        &mut *tx,
        repositories::wallets::CreateTransaction {
            wallet_id: &wallet.id,
            kind: TransactionKind::Credit,
            amount: payload.amount,
            reason: "admin_topup",
            source_id: None,
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to record transaction"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok(Json(WalletResponse::from_db(wallet)))
}
