use crate::AppState;
use crate::db::queries;
use crate::error::AppError;
use crate::services::withdrawal::CreateWithdrawal;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateWithdrawal>,
) -> Result<impl IntoResponse, AppError> {
    let request = state.withdrawals.create(payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let request = queries::get_withdrawal_request(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Withdrawal {} not found", id)))?;

    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
pub struct AdminAction {
    pub admin_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RejectAction {
    pub admin_id: Uuid,
    pub reason: String,
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<AdminAction>,
) -> Result<impl IntoResponse, AppError> {
    let request = state.withdrawals.approve(id, action.admin_id).await?;
    Ok(Json(request))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<RejectAction>,
) -> Result<impl IntoResponse, AppError> {
    if action.reason.trim().is_empty() {
        return Err(AppError::Validation(
            "A rejection reason is required".to_string(),
        ));
    }
    let request = state
        .withdrawals
        .reject(id, action.admin_id, action.reason.trim())
        .await?;
    Ok(Json(request))
}

pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<AdminAction>,
) -> Result<impl IntoResponse, AppError> {
    let request = state.withdrawals.complete(id, action.admin_id).await?;
    Ok(Json(request))
}
