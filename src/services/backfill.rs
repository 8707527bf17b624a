//! Ledger backfill: one-shot repair job that accrues earnings for settled
//! orders that never got one (incidents, migrations). Idempotent: accrual
//! skips orders that already carry an earning entry.

use crate::db::models::Order;
use crate::db::queries;
use crate::error::AppError;
use crate::services::JobReport;
use crate::services::wallet::WalletService;
use sqlx::PgPool;
use tracing::{error, info};

#[derive(Clone)]
pub struct BackfillJob {
    pool: PgPool,
    wallet: WalletService,
}

impl BackfillJob {
    pub fn new(pool: PgPool, wallet: WalletService) -> Self {
        Self { pool, wallet }
    }

    /// Scan every settled order; accrue the missing ones. Safe to run any
    /// number of times: the second run reports everything as skipped.
    pub async fn run(&self) -> Result<JobReport, AppError> {
        let orders = queries::settled_orders(&self.pool).await?;

        let mut report = JobReport::default();
        for order in &orders {
            match self.backfill_order(order).await {
                Ok(true) => report.record_processed(format!("order {}: accrued", order.id)),
                Ok(false) => {
                    report.record_skipped(format!("order {}: already has earning entry", order.id))
                }
                Err(e) => {
                    error!(order_id = %order.id, error = %e, "Backfill failed for order");
                    report.record_error(format!("order {}: {}", order.id, e));
                }
            }
        }

        info!(
            total = report.total,
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "Ledger backfill finished"
        );

        Ok(report)
    }

    async fn backfill_order(&self, order: &Order) -> Result<bool, AppError> {
        // Escrow runs from the original settlement time, not from "now":
        // historical accruals keep their correct release schedule.
        let paid_at = order.paid_at.ok_or_else(|| {
            AppError::Internal(format!("Settled order {} has no paid_at", order.id))
        })?;

        let mut tx = self.pool.begin().await?;
        let entry = self.wallet.accrue_for_order(&mut tx, order, paid_at).await?;
        tx.commit().await?;

        Ok(entry.is_some())
    }
}
