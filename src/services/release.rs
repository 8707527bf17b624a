//! Scheduled release sweep: matures pending ledger entries whose escrow
//! window has elapsed. Invoked by an external scheduler; holds no state.

use crate::db::queries;
use crate::error::AppError;
use crate::services::JobReport;
use crate::services::wallet::{WalletService, format_pi};
use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info};

#[derive(Clone)]
pub struct ReleaseSweep {
    pool: PgPool,
    wallet: WalletService,
}

impl ReleaseSweep {
    pub fn new(pool: PgPool, wallet: WalletService) -> Self {
        Self { pool, wallet }
    }

    /// One sweep tick. Each entry commits independently, so a killed sweep
    /// loses at most its in-flight entry and a re-run picks up the rest.
    pub async fn run(&self) -> Result<JobReport, AppError> {
        let now = Utc::now();
        let batch_size = self.wallet.settings().sweep_batch_size;
        let due = queries::due_pending_entries(&self.pool, now, batch_size).await?;

        let mut report = JobReport::default();
        for entry in &due {
            match self.wallet.release_entry(entry).await {
                Ok(true) => report.record_processed(format!(
                    "released entry {} ({} pi)",
                    entry.id,
                    format_pi(entry.amount_pi)
                )),
                Ok(false) => {
                    report.record_skipped(format!("entry {} no longer releasable", entry.id))
                }
                Err(e) => {
                    error!(entry_id = %entry.id, error = %e, "Failed to release entry");
                    report.record_error(format!("entry {}: {}", entry.id, e));
                }
            }
        }

        info!(
            total = report.total,
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "Release sweep finished"
        );

        Ok(report)
    }
}
