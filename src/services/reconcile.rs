//! Reconciliation sweep: re-attempts matching for orders stuck in pending
//! past the SLA, scanning the unmatched-transaction store.

use crate::db::models::{BankTransaction, NotificationKind, Order, UnmatchedTransaction};
use crate::db::queries;
use crate::error::AppError;
use crate::parser::{self, ParsedOrderRef};
use crate::services::JobReport;
use crate::services::notify::NotificationService;
use crate::services::settlement::{self, SettleOutcome};
use crate::services::wallet::WalletService;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct ReconcileSweep {
    pool: PgPool,
    wallet: WalletService,
    notifier: NotificationService,
}

impl ReconcileSweep {
    pub fn new(pool: PgPool, wallet: WalletService, notifier: NotificationService) -> Self {
        Self {
            pool,
            wallet,
            notifier,
        }
    }

    /// One sweep tick over stale pending orders. Per-order failures are
    /// recorded and the sweep moves on.
    pub async fn run(&self) -> Result<JobReport, AppError> {
        let settings = self.wallet.settings();
        let orders = queries::stale_pending_orders(
            &self.pool,
            settings.reconcile_sla_minutes,
            settings.sweep_batch_size,
        )
        .await?;

        let mut report = JobReport::default();
        for order in &orders {
            match self.reconcile_order(order).await {
                Ok(Some(external_id)) => report.record_processed(format!(
                    "order {} settled by transaction {}",
                    order.id, external_id
                )),
                Ok(None) => {
                    report.record_skipped(format!("order {}: no matching transaction", order.id))
                }
                Err(e) => {
                    error!(order_id = %order.id, error = %e, "Reconciliation failed for order");
                    report.record_error(format!("order {}: {}", order.id, e));
                }
            }
        }

        info!(
            total = report.total,
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "Reconciliation sweep finished"
        );

        Ok(report)
    }

    /// An order is settled by exactly one transaction: the first unmatched
    /// candidate with the exact amount whose description mentions the order.
    async fn reconcile_order(&self, order: &Order) -> Result<Option<String>, AppError> {
        let candidates =
            queries::unmatched_transactions_by_amount(&self.pool, order.amount_vnd).await?;
        let compact_id = order.compact_id();

        for candidate in &candidates {
            if !mentions_order(&candidate.description, &compact_id) {
                continue;
            }
            if self.settle_from_unmatched(order, candidate).await? {
                self.notifier
                    .send(
                        order.buyer_id,
                        NotificationKind::PaymentVerified,
                        format!("Đơn hàng {} đã được thanh toán", order.id),
                    )
                    .await;
                return Ok(Some(candidate.external_id.clone()));
            }
            // the order left pending under us; nothing more to do here
            return Ok(None);
        }

        Ok(None)
    }

    /// The unmatched -> matched move, the order flip and the accrual are one
    /// transaction: a partial failure can never leave the transaction in
    /// both stores or in neither.
    async fn settle_from_unmatched(
        &self,
        order: &Order,
        candidate: &UnmatchedTransaction,
    ) -> Result<bool, AppError> {
        let now = Utc::now();
        let bank_tx = BankTransaction {
            id: Uuid::new_v4(),
            external_id: candidate.external_id.clone(),
            order_id: order.id,
            amount_vnd: candidate.amount_vnd,
            description: candidate.description.clone(),
            source_account: candidate.source_account.clone(),
            occurred_at: candidate.occurred_at,
            matched_at: now,
        };

        let mut tx = self.pool.begin().await?;

        if queries::insert_matched_transaction(&mut tx, &bank_tx).await? == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        match settlement::settle_order(&mut tx, order.id, bank_tx.id, now).await? {
            SettleOutcome::Settled => {}
            SettleOutcome::AlreadySettled | SettleOutcome::NotPending => {
                tx.rollback().await?;
                return Ok(false);
            }
        }

        queries::delete_unmatched_transaction(&mut tx, candidate.id).await?;
        self.wallet.accrue_for_order(&mut tx, order, now).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            external_id = %candidate.external_id,
            "Stale order reconciled against unmatched transaction"
        );

        Ok(true)
    }
}

/// Containment check plus the parser's own reading of the description;
/// either way the transaction must name this order (or a prefix of it).
fn mentions_order(description: &str, compact_id: &str) -> bool {
    if parser::contains_identifier(description, compact_id) {
        return true;
    }
    match parser::extract_order_ref(description) {
        Some(ParsedOrderRef::Full(canonical)) => canonical.replace('-', "") == compact_id,
        Some(ParsedOrderRef::Partial(prefix)) => compact_id.starts_with(&prefix),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPACT: &str = "4d3d37edec53f1a00000000000000000";

    #[test]
    fn mentions_order_by_full_id() {
        assert!(mentions_order(
            &format!("chuyen tien DH{} ft123456 ib", COMPACT),
            COMPACT
        ));
    }

    #[test]
    fn mentions_order_by_prefix() {
        assert!(mentions_order("ck dh 4d3d37edec53", COMPACT));
    }

    #[test]
    fn does_not_mention_unrelated_order() {
        assert!(!mentions_order("ck dh deadbeefcafe", COMPACT));
        assert!(!mentions_order("chuyen tien mua hang", COMPACT));
    }
}
