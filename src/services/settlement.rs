use crate::db::models::OrderStatus;
use crate::db::queries;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

/// Outcome of attempting to flip an order pending -> paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Settled,
    /// The order already carries a settling transaction (paid or beyond).
    AlreadySettled,
    /// The order left pending through another path (cancelled).
    NotPending,
}

/// Settle an order against a matched bank transaction. The status flip is a
/// conditional update: zero affected rows is a real conflict, classified by
/// re-reading the current status, never retried.
pub async fn settle_order(
    executor: &mut SqlxTransaction<'_, Postgres>,
    order_id: Uuid,
    bank_tx_id: Uuid,
    paid_at: DateTime<Utc>,
) -> Result<SettleOutcome, AppError> {
    let updated = queries::mark_order_paid(executor, order_id, bank_tx_id, paid_at).await?;
    if updated == 1 {
        return Ok(SettleOutcome::Settled);
    }

    let status = queries::get_order_status(executor, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
    let status: OrderStatus = status
        .parse()
        .map_err(|e| AppError::Internal(format!("Order {}: {}", order_id, e)))?;

    match status {
        OrderStatus::Paid
        | OrderStatus::Disputed
        | OrderStatus::Refunded
        | OrderStatus::Completed => Ok(SettleOutcome::AlreadySettled),
        OrderStatus::Cancelled => Ok(SettleOutcome::NotPending),
        // The conditional update saw a non-pending row, so this cannot be
        // reached once the surrounding transaction commits or aborts.
        OrderStatus::Pending => Err(AppError::Internal(format!(
            "Order {} reported pending after a failed settle",
            order_id
        ))),
    }
}
