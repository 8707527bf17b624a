//! Admin-triggered batch jobs. The sweeps are stateless handlers; an
//! external scheduler (cron, k8s CronJob) decides the cadence and re-runs
//! are always safe.

use crate::AppState;
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::Pagination;
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

pub async fn release_sweep(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = state.release_sweep.run().await?;
    Ok(Json(report))
}

pub async fn reconcile(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = state.reconcile_sweep.run().await?;
    Ok(Json(report))
}

pub async fn backfill(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = state.backfill.run().await?;
    Ok(Json(report))
}

/// Operator view of the unmatched store: what came in, why it did not
/// match, verbatim descriptions included.
pub async fn list_unmatched(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let transactions =
        queries::list_unmatched_transactions(&state.db, pagination.limit(), pagination.offset())
            .await?;
    Ok(Json(transactions))
}
