//! Wallet ledger: accrual, release, dispute refunds and withdrawal locking.
//!
//! Every balance mutation is one conditional-update statement paired with
//! exactly one append-only log entry, chosen so that for any wallet
//! `pending_pi + available_pi` always equals the signed sum of its entries.

use crate::config::EngineSettings;
use crate::db::models::{EntryStatus, EntryType, Order, OrderStatus, WalletLogEntry};
use crate::db::queries;
use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use tracing::{info, warn};
use uuid::Uuid;

/// Fixed-point scale: 1 pi = 1000 milli-pi.
pub const MILLI_PI: i64 = 1_000;

/// VND -> milli-pi at a fixed rate. Truncating division: the ledger never
/// credits more than the rate allows.
pub fn vnd_to_milli_pi(amount_vnd: i64, rate_vnd_per_pi: i64) -> i64 {
    amount_vnd.saturating_mul(MILLI_PI) / rate_vnd_per_pi
}

/// Milli-pi -> VND at the same fixed rate, truncating.
pub fn milli_pi_to_vnd(amount_pi: i64, rate_vnd_per_pi: i64) -> i64 {
    amount_pi.saturating_mul(rate_vnd_per_pi) / MILLI_PI
}

/// Render milli-pi with three decimals for human-facing descriptions.
pub fn format_pi(amount_pi: i64) -> String {
    let sign = if amount_pi < 0 { "-" } else { "" };
    let abs = amount_pi.abs();
    format!("{}{}.{:03}", sign, abs / MILLI_PI, abs % MILLI_PI)
}

/// Result of a dispute refund, including how much could actually be
/// reclaimed from `pending`.
#[derive(Debug, Clone, Serialize)]
pub struct RefundOutcome {
    pub refunded_pi: i64,
    pub shortfall_pi: i64,
    /// Set when the held funds were already (partly) released before the
    /// dispute; the difference needs manual reconciliation.
    pub manual_review: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub wallet_id: Uuid,
    pub pending_pi: i64,
    pub available_pi: i64,
    pub entry_sum_pi: i64,
    pub consistent: bool,
}

#[derive(Clone)]
pub struct WalletService {
    pool: PgPool,
    settings: EngineSettings,
}

impl WalletService {
    pub fn new(pool: PgPool, settings: EngineSettings) -> Self {
        Self { pool, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Credit the seller's wallet for a settled order. Idempotent per order:
    /// a second call finds the existing `earning` entry and does nothing,
    /// which lets the live path and the backfill job share this code.
    ///
    /// `settled_at` is the escrow basis: the live path passes "now", the
    /// backfill job passes the order's original settlement time.
    pub async fn accrue_for_order(
        &self,
        executor: &mut SqlxTransaction<'_, Postgres>,
        order: &Order,
        settled_at: DateTime<Utc>,
    ) -> Result<Option<WalletLogEntry>, AppError> {
        if queries::earning_entry_exists(executor, order.id).await? {
            return Ok(None);
        }

        let wallet = queries::get_or_create_wallet(executor, order.seller_id).await?;
        let amount_pi = vnd_to_milli_pi(order.amount_vnd, self.settings.pi_rate_vnd);
        let release_at = settled_at + Duration::days(self.settings.escrow_hold_days);

        queries::credit_pending(executor, wallet.id, amount_pi).await?;

        let entry = WalletLogEntry::new(
            wallet.id,
            Some(order.id),
            EntryType::Earning,
            EntryStatus::Pending,
            amount_pi,
            order.amount_vnd,
            format!("Thu nhập đơn hàng {}", order.id),
            Some(release_at),
        );
        let entry = queries::insert_wallet_log_entry(executor, &entry).await?;

        info!(
            wallet_id = %wallet.id,
            order_id = %order.id,
            amount_pi = amount_pi,
            release_at = %release_at,
            "Accrued earning into pending"
        );

        Ok(Some(entry))
    }

    /// Mature one entry: flip pending -> released and move its amount from
    /// `pending` to `available`. Returns false when the entry was already
    /// released (benign race with early release or a concurrent sweep).
    pub async fn release_entry(&self, entry: &WalletLogEntry) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        // The dispute gate; the sweep query also filters, but the status can
        // change between the read and this transaction.
        if let Some(order_id) = entry.order_id {
            if let Some(status) = queries::get_order_status(&mut tx, order_id).await? {
                if matches!(
                    status.parse::<OrderStatus>(),
                    Ok(OrderStatus::Disputed) | Ok(OrderStatus::Refunded)
                ) {
                    tx.rollback().await?;
                    return Ok(false);
                }
            }
        }

        if queries::mark_entry_released(&mut tx, entry.id).await? == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if queries::move_pending_to_available(&mut tx, entry.wallet_id, entry.amount_pi).await? == 0
        {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Wallet {} has less than {} pending for entry {}",
                entry.wallet_id,
                format_pi(entry.amount_pi),
                entry.id
            )));
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Early release: mature every pending entry of an order right now,
    /// bypassing the escrow window. Returns the total released, zero when
    /// there was nothing pending (buyer confirmation racing the scheduler
    /// is expected and harmless). `marker` records why the window was
    /// bypassed (buyer confirmation or dispute resolution).
    pub async fn release_for_order(
        &self,
        order_id: Uuid,
        marker: EntryType,
    ) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        if let Some(status) = queries::get_order_status(&mut tx, order_id).await? {
            if matches!(
                status.parse::<OrderStatus>(),
                Ok(OrderStatus::Disputed) | Ok(OrderStatus::Refunded)
            ) {
                tx.rollback().await?;
                return Err(AppError::Conflict(format!(
                    "Order {} is under dispute; funds stay held",
                    order_id
                )));
            }
        }

        let entries = queries::pending_entries_for_order(&mut tx, order_id).await?;
        let mut released_total = 0i64;
        let mut wallet_id = None;

        for entry in &entries {
            if queries::mark_entry_released(&mut tx, entry.id).await? == 0 {
                continue;
            }
            if queries::move_pending_to_available(&mut tx, entry.wallet_id, entry.amount_pi).await?
                == 0
            {
                tx.rollback().await?;
                return Err(AppError::Conflict(format!(
                    "Wallet {} has less than {} pending for entry {}",
                    entry.wallet_id,
                    format_pi(entry.amount_pi),
                    entry.id
                )));
            }
            released_total += entry.amount_pi;
            wallet_id = Some(entry.wallet_id);
        }

        if let Some(wallet_id) = wallet_id {
            let entry = WalletLogEntry::new(
                wallet_id,
                Some(order_id),
                marker,
                EntryStatus::Released,
                0,
                0,
                format!(
                    "Giải phóng sớm {} pi cho đơn hàng {}",
                    format_pi(released_total),
                    order_id
                ),
                None,
            );
            queries::insert_wallet_log_entry(&mut tx, &entry).await?;
        }

        tx.commit().await?;

        if released_total > 0 {
            info!(
                order_id = %order_id,
                released_pi = released_total,
                "Released pending funds early"
            );
        }

        Ok(released_total)
    }

    /// Refund path of dispute resolution: reclaim the order's held funds
    /// from `pending` and the lifetime total. Clamped at what is actually
    /// still pending; a shortfall (funds released before the dispute was
    /// filed) is flagged for manual reconciliation, never clawed back from
    /// `available`.
    pub async fn refund_for_order(
        &self,
        executor: &mut SqlxTransaction<'_, Postgres>,
        order: &Order,
    ) -> Result<RefundOutcome, AppError> {
        let entries = queries::pending_entries_for_order(executor, order.id).await?;
        let held: i64 = entries
            .iter()
            .filter(|entry| entry.entry_type == EntryType::Earning.as_str())
            .map(|entry| entry.amount_pi)
            .sum();

        let wallet = queries::get_or_create_wallet(executor, order.seller_id).await?;
        let refundable = held.min(wallet.pending_pi).max(0);
        let shortfall = held - refundable;

        for entry in &entries {
            // Consumed by the offsetting refund entry; released here so no
            // later sweep can mature them.
            queries::mark_entry_released(executor, entry.id).await?;
        }

        if refundable > 0
            && queries::debit_pending_for_refund(executor, wallet.id, refundable).await? == 0
        {
            return Err(AppError::Conflict(format!(
                "Wallet {} pending changed under refund of order {}",
                wallet.id, order.id
            )));
        }

        let manual_review = shortfall > 0 || held == 0;
        let mut description = format!("Hoàn tiền khiếu nại đơn hàng {}", order.id);
        if manual_review {
            description.push_str(" (thiếu quỹ tạm giữ, cần đối soát thủ công)");
        }

        let entry = WalletLogEntry::new(
            wallet.id,
            Some(order.id),
            EntryType::DisputeRefund,
            EntryStatus::Released,
            -refundable,
            -milli_pi_to_vnd(refundable, self.settings.pi_rate_vnd),
            description,
            None,
        );
        queries::insert_wallet_log_entry(executor, &entry).await?;

        if manual_review {
            warn!(
                order_id = %order.id,
                wallet_id = %wallet.id,
                held_pi = held,
                refunded_pi = refundable,
                "Dispute refund shortfall; flagged for manual reconciliation"
            );
        }

        Ok(RefundOutcome {
            refunded_pi: refundable,
            shortfall_pi: shortfall,
            manual_review,
        })
    }

    /// Reserve `available` funds against an open withdrawal request. The
    /// balance check and the decrement are a single conditional update.
    pub async fn lock_for_withdrawal(
        &self,
        executor: &mut SqlxTransaction<'_, Postgres>,
        wallet_id: Uuid,
        amount_pi: i64,
    ) -> Result<(), AppError> {
        if queries::lock_available(executor, wallet_id, amount_pi).await? == 0 {
            return Err(AppError::InsufficientFunds(
                "Số dư khả dụng không đủ để rút".to_string(),
            ));
        }
        Ok(())
    }

    /// Exact reversal of the withdrawal lock, for rejected requests.
    pub async fn unlock_on_reject(
        &self,
        executor: &mut SqlxTransaction<'_, Postgres>,
        wallet_id: Uuid,
        amount_pi: i64,
    ) -> Result<(), AppError> {
        if queries::unlock_available(executor, wallet_id, amount_pi).await? == 0 {
            return Err(AppError::Internal(format!(
                "Wallet {} missing while unlocking a rejected withdrawal",
                wallet_id
            )));
        }
        Ok(())
    }

    /// Approved withdrawals permanently leave the payable pool: the locked
    /// amount is deducted from `total_earned`, nothing else moves.
    pub async fn finalize_on_approve(
        &self,
        executor: &mut SqlxTransaction<'_, Postgres>,
        wallet_id: Uuid,
        amount_pi: i64,
    ) -> Result<(), AppError> {
        if queries::finalize_total_earned(executor, wallet_id, amount_pi).await? == 0 {
            return Err(AppError::Conflict(format!(
                "Wallet {} lifetime total is below the approved amount",
                wallet_id
            )));
        }
        Ok(())
    }

    /// Recompute the ledger invariant for one wallet:
    /// pending + available == signed sum of all log entries.
    pub async fn check_integrity(&self, wallet_id: Uuid) -> Result<IntegrityReport, AppError> {
        let wallet = queries::get_wallet(&self.pool, wallet_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Wallet {} not found", wallet_id)))?;
        let entry_sum = queries::sum_entry_amounts(&self.pool, wallet_id).await?;

        let consistent = wallet.pending_pi + wallet.available_pi == entry_sum;
        if !consistent {
            warn!(
                wallet_id = %wallet_id,
                pending_pi = wallet.pending_pi,
                available_pi = wallet.available_pi,
                entry_sum_pi = entry_sum,
                "Wallet ledger drift detected"
            );
        }

        Ok(IntegrityReport {
            wallet_id,
            pending_pi: wallet.pending_pi,
            available_pi: wallet.available_pi,
            entry_sum_pi: entry_sum,
            consistent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_truncates_instead_of_rounding() {
        // 14999 VND at 10000 VND/pi is 1.4999 pi; the ledger credits 1.499
        assert_eq!(vnd_to_milli_pi(14_999, 10_000), 1_499);
        assert_eq!(vnd_to_milli_pi(150_000, 10_000), 15_000);
        assert_eq!(vnd_to_milli_pi(0, 10_000), 0);
        assert_eq!(vnd_to_milli_pi(9, 10_000), 0);
    }

    #[test]
    fn conversion_round_trip_never_overpays() {
        for amount_vnd in [1, 999, 10_000, 14_999, 150_000, 1_234_567] {
            let pi = vnd_to_milli_pi(amount_vnd, 10_000);
            assert!(milli_pi_to_vnd(pi, 10_000) <= amount_vnd);
        }
    }

    #[test]
    fn formats_milli_pi_with_three_decimals() {
        assert_eq!(format_pi(15_000), "15.000");
        assert_eq!(format_pi(1_499), "1.499");
        assert_eq!(format_pi(0), "0.000");
        assert_eq!(format_pi(-2_500), "-2.500");
    }

    #[test]
    fn entry_amount_conventions_preserve_the_invariant() {
        // pending + available must track the signed entry sum across the
        // whole lifecycle: accrue, release, refund, lock, unlock, approve.
        let mut pending = 0i64;
        let mut available = 0i64;
        let mut entry_sum = 0i64;

        // accrual: +X entry, pending += X
        pending += 15_000;
        entry_sum += 15_000;
        assert_eq!(pending + available, entry_sum);

        // release: status flip only, pool-internal move
        pending -= 15_000;
        available += 15_000;
        assert_eq!(pending + available, entry_sum);

        // withdrawal lock: -X entry, available -= X
        available -= 4_000;
        entry_sum += -4_000;
        assert_eq!(pending + available, entry_sum);

        // reject: +X entry, available += X
        available += 4_000;
        entry_sum += 4_000;
        assert_eq!(pending + available, entry_sum);

        // second lock then approve: approval is a zero-amount entry
        available -= 4_000;
        entry_sum += -4_000;
        entry_sum += 0;
        assert_eq!(pending + available, entry_sum);
    }

    #[test]
    fn refund_clamp_never_goes_negative() {
        // held funds partially released before the dispute was filed
        let held = 15_000i64;
        let wallet_pending = 5_000i64;
        let refundable = held.min(wallet_pending).max(0);

        assert_eq!(refundable, 5_000);
        assert_eq!(wallet_pending - refundable, 0);
        assert!(held - refundable > 0); // shortfall flagged, not clawed back
    }
}
