//! Matches incoming bank transfers to pending orders.

use crate::db::models::{BankTransaction, NotificationKind, Order, OrderStatus, UnmatchedTransaction};
use crate::db::queries;
use crate::error::AppError;
use crate::parser::{self, ParsedOrderRef};
use crate::services::notify::NotificationService;
use crate::services::settlement::{self, SettleOutcome};
use crate::services::wallet::WalletService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

/// A parsed transfer notification as delivered by the banking transport.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingTransfer {
    pub external_id: String,
    pub amount_vnd: i64,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub source_account: String,
}

/// Exactly one of these per ingested transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched { order_id: Uuid },
    Unmatched { reason: String },
    /// Same external id seen before; at-least-once delivery, discarded.
    Duplicate,
}

enum Resolution {
    Found(Order),
    NoMatch(String),
}

#[derive(Clone)]
pub struct PaymentMatcher {
    pool: PgPool,
    wallet: WalletService,
    notifier: NotificationService,
}

impl PaymentMatcher {
    pub fn new(pool: PgPool, wallet: WalletService, notifier: NotificationService) -> Self {
        Self {
            pool,
            wallet,
            notifier,
        }
    }

    /// Ingest one transfer: settle the unique pending order it pays for, or
    /// file it as unmatched for later reconciliation.
    pub async fn ingest(&self, transfer: IncomingTransfer) -> Result<MatchOutcome, AppError> {
        if queries::matched_transaction_exists(&self.pool, &transfer.external_id).await? {
            info!(
                external_id = %transfer.external_id,
                "Duplicate transfer delivery discarded"
            );
            return Ok(MatchOutcome::Duplicate);
        }

        let order = match self.resolve_order(&transfer).await? {
            Resolution::Found(order) => order,
            Resolution::NoMatch(reason) => return self.file_unmatched(&transfer, reason).await,
        };

        if order.status != OrderStatus::Pending.as_str() {
            let reason = format!("Order {} is {}, not pending", order.id, order.status);
            return self.file_unmatched(&transfer, reason).await;
        }
        if order.amount_vnd != transfer.amount_vnd {
            // exact match only; the currency has no fractional settlement
            let reason = format!(
                "Amount mismatch for order {}: expected {} got {}",
                order.id, order.amount_vnd, transfer.amount_vnd
            );
            return self.file_unmatched(&transfer, reason).await;
        }

        self.settle_and_record(&order, &transfer).await
    }

    /// Resolve the description to at most one order. Ambiguity never
    /// settles: correctness over recall.
    async fn resolve_order(&self, transfer: &IncomingTransfer) -> Result<Resolution, AppError> {
        let parsed = match parser::extract_order_ref(&transfer.description) {
            Some(parsed) => parsed,
            None => {
                return Ok(Resolution::NoMatch(
                    "No order reference found in description".to_string(),
                ));
            }
        };

        match parsed {
            ParsedOrderRef::Full(canonical) => {
                let order_id = match Uuid::parse_str(&canonical) {
                    Ok(id) => id,
                    Err(_) => {
                        return Ok(Resolution::NoMatch(format!(
                            "Extracted reference {} is not a valid identifier",
                            canonical
                        )));
                    }
                };
                match queries::get_order(&self.pool, order_id).await? {
                    Some(order) => Ok(Resolution::Found(order)),
                    None => Ok(Resolution::NoMatch(format!("Order {} not found", order_id))),
                }
            }
            ParsedOrderRef::Partial(prefix) => {
                let mut candidates =
                    queries::find_pending_orders_by_prefix(&self.pool, &prefix).await?;
                match candidates.len() {
                    1 => Ok(Resolution::Found(candidates.swap_remove(0))),
                    0 => Ok(Resolution::NoMatch(format!(
                        "No pending order matches prefix {}",
                        prefix
                    ))),
                    _ => {
                        warn!(
                            prefix = %prefix,
                            external_id = %transfer.external_id,
                            "Ambiguous order prefix; filing transfer as unmatched"
                        );
                        Ok(Resolution::NoMatch(format!(
                            "Prefix {} matches multiple pending orders",
                            prefix
                        )))
                    }
                }
            }
        }
    }

    /// The settle-and-record sequence: order flip, matched-store insert and
    /// ledger accrual commit or roll back together.
    async fn settle_and_record(
        &self,
        order: &Order,
        transfer: &IncomingTransfer,
    ) -> Result<MatchOutcome, AppError> {
        let now = Utc::now();
        let bank_tx = BankTransaction {
            id: Uuid::new_v4(),
            external_id: transfer.external_id.clone(),
            order_id: order.id,
            amount_vnd: transfer.amount_vnd,
            description: transfer.description.clone(),
            source_account: transfer.source_account.clone(),
            occurred_at: transfer.occurred_at,
            matched_at: now,
        };

        let mut tx = self.pool.begin().await?;

        if queries::insert_matched_transaction(&mut tx, &bank_tx).await? == 0 {
            // another delivery of the same external id won the race
            tx.rollback().await?;
            return Ok(MatchOutcome::Duplicate);
        }

        match settlement::settle_order(&mut tx, order.id, bank_tx.id, now).await? {
            SettleOutcome::Settled => {}
            SettleOutcome::AlreadySettled | SettleOutcome::NotPending => {
                tx.rollback().await?;
                let reason = format!("Order {} left pending before settlement", order.id);
                return self.file_unmatched(transfer, reason).await;
            }
        }

        self.wallet.accrue_for_order(&mut tx, order, now).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            external_id = %transfer.external_id,
            amount_vnd = transfer.amount_vnd,
            "Transfer matched and order settled"
        );

        self.notifier
            .send(
                order.buyer_id,
                NotificationKind::PaymentVerified,
                format!("Đơn hàng {} đã được thanh toán", order.id),
            )
            .await;

        Ok(MatchOutcome::Matched { order_id: order.id })
    }

    /// File the transfer verbatim for later reconciliation and operator
    /// inspection. Re-filing the same external id is a no-op.
    async fn file_unmatched(
        &self,
        transfer: &IncomingTransfer,
        reason: String,
    ) -> Result<MatchOutcome, AppError> {
        let unmatched = UnmatchedTransaction {
            id: Uuid::new_v4(),
            external_id: transfer.external_id.clone(),
            amount_vnd: transfer.amount_vnd,
            description: transfer.description.clone(),
            source_account: transfer.source_account.clone(),
            occurred_at: transfer.occurred_at,
            reason: reason.clone(),
            created_at: Utc::now(),
        };
        queries::insert_unmatched_transaction(&self.pool, &unmatched).await?;

        info!(
            external_id = %transfer.external_id,
            reason = %reason,
            "Transfer filed as unmatched"
        );

        Ok(MatchOutcome::Unmatched { reason })
    }
}
