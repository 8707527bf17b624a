//! Dispute hold and resolution. A dispute never moves funds by itself: it
//! flips the order to `disputed`, which both release paths consult before
//! maturing entries. Resolution either lifts the gate (release) or reclaims
//! the held funds (refund).

use crate::db::models::{
    EntryStatus, EntryType, NotificationKind, OrderStatus, WalletLogEntry,
};
use crate::db::queries;
use crate::error::AppError;
use crate::services::notify::NotificationService;
use crate::services::wallet::{RefundOutcome, WalletService, format_pi};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolution {
    Release,
    Refund,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum DisputeOutcome {
    Released { amount_pi: i64 },
    Refunded(RefundOutcome),
}

#[derive(Clone)]
pub struct DisputeService {
    pool: PgPool,
    wallet: WalletService,
    notifier: NotificationService,
}

impl DisputeService {
    pub fn new(pool: PgPool, wallet: WalletService, notifier: NotificationService) -> Self {
        Self {
            pool,
            wallet,
            notifier,
        }
    }

    /// Open a dispute on a paid order. No balance change, only the
    /// release-eligibility gate plus a marker entry for the audit trail.
    pub async fn open(&self, order_id: Uuid) -> Result<(), AppError> {
        let order = queries::get_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

        let mut tx = self.pool.begin().await?;
        if queries::update_order_status(&mut tx, order_id, OrderStatus::Paid, OrderStatus::Disputed)
            .await?
            == 0
        {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Order {} is not paid; cannot open a dispute",
                order_id
            )));
        }

        let wallet = queries::get_or_create_wallet(&mut tx, order.seller_id).await?;
        let entry = WalletLogEntry::new(
            wallet.id,
            Some(order_id),
            EntryType::DisputeHold,
            EntryStatus::Released,
            0,
            0,
            format!("Tạm giữ thu nhập đơn hàng {} do khiếu nại", order_id),
            None,
        );
        queries::insert_wallet_log_entry(&mut tx, &entry).await?;
        tx.commit().await?;

        info!(order_id = %order_id, "Dispute opened; releases gated");

        self.notifier
            .send(
                order.seller_id,
                NotificationKind::DisputeOpened,
                format!("Đơn hàng {} đang bị khiếu nại, thu nhập tạm giữ", order_id),
            )
            .await;

        Ok(())
    }

    pub async fn resolve(
        &self,
        order_id: Uuid,
        resolution: DisputeResolution,
    ) -> Result<DisputeOutcome, AppError> {
        match resolution {
            DisputeResolution::Release => self.resolve_release(order_id).await,
            DisputeResolution::Refund => self.resolve_refund(order_id).await,
        }
    }

    /// Seller wins: lift the gate, then the usual early-release path.
    async fn resolve_release(&self, order_id: Uuid) -> Result<DisputeOutcome, AppError> {
        let order = queries::get_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

        let mut tx = self.pool.begin().await?;
        if queries::update_order_status(&mut tx, order_id, OrderStatus::Disputed, OrderStatus::Paid)
            .await?
            == 0
        {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Order {} is not disputed",
                order_id
            )));
        }
        tx.commit().await?;

        let released = self
            .wallet
            .release_for_order(order_id, EntryType::DisputeRelease)
            .await?;

        info!(order_id = %order_id, released_pi = released, "Dispute resolved: released");

        self.notifier
            .send(
                order.seller_id,
                NotificationKind::DisputeResolved,
                format!(
                    "Khiếu nại đơn hàng {} đã đóng, {} pi được giải phóng",
                    order_id,
                    format_pi(released)
                ),
            )
            .await;

        Ok(DisputeOutcome::Released {
            amount_pi: released,
        })
    }

    /// Buyer wins: the order becomes refunded and the held funds leave the
    /// wallet, clamped so the balance never goes negative.
    async fn resolve_refund(&self, order_id: Uuid) -> Result<DisputeOutcome, AppError> {
        let order = queries::get_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

        let mut tx = self.pool.begin().await?;
        if queries::update_order_status(
            &mut tx,
            order_id,
            OrderStatus::Disputed,
            OrderStatus::Refunded,
        )
        .await?
            == 0
        {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Order {} is not disputed",
                order_id
            )));
        }

        let outcome = self.wallet.refund_for_order(&mut tx, &order).await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            refunded_pi = outcome.refunded_pi,
            manual_review = outcome.manual_review,
            "Dispute resolved: refunded"
        );

        self.notifier
            .send(
                order.seller_id,
                NotificationKind::DisputeResolved,
                format!(
                    "Khiếu nại đơn hàng {} kết thúc: hoàn {} pi cho người mua",
                    order_id,
                    format_pi(outcome.refunded_pi)
                ),
            )
            .await;

        Ok(DisputeOutcome::Refunded(outcome))
    }
}
