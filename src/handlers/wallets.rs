use crate::AppState;
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::Pagination;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let wallet = queries::get_wallet_by_owner(&state.db, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Wallet for owner {} not found", owner_id)))?;

    Ok(Json(wallet))
}

pub async fn list_entries(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let wallet = queries::get_wallet_by_owner(&state.db, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Wallet for owner {} not found", owner_id)))?;

    let entries = queries::entries_for_wallet(
        &state.db,
        wallet.id,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;

    Ok(Json(entries))
}

/// Recompute the ledger invariant for the owner's wallet; drift shows up
/// here before it shows up in support tickets.
pub async fn integrity(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let wallet = queries::get_wallet_by_owner(&state.db, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Wallet for owner {} not found", owner_id)))?;

    let report = state.wallet.check_integrity(wallet.id).await?;
    Ok(Json(report))
}
