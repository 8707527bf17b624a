//! Withdrawal workflow: request -> admin approve/reject -> complete, with
//! fund locking and a rolling-window rate limit. Payouts themselves are
//! manual bank transfers; this state machine only moves the ledger.

use crate::db::models::{
    EntryStatus, EntryType, NotificationKind, WalletLogEntry, WithdrawalRequest, WithdrawalStatus,
};
use crate::db::queries;
use crate::error::AppError;
use crate::services::notify::NotificationService;
use crate::services::wallet::{WalletService, format_pi, milli_pi_to_vnd};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWithdrawal {
    pub requester_id: Uuid,
    pub amount_pi: i64,
    pub bank_name: String,
    pub bank_account_number: String,
    pub bank_account_name: String,
}

/// Synchronous validation; nothing is mutated when it fails. Failure
/// reasons are user-visible.
pub fn validate_request(input: &CreateWithdrawal, min_amount_pi: i64) -> Result<(), AppError> {
    if input.amount_pi <= 0 {
        return Err(AppError::Validation(
            "Số pi rút phải lớn hơn 0".to_string(),
        ));
    }
    if input.amount_pi < min_amount_pi {
        return Err(AppError::Validation(format!(
            "Số pi rút tối thiểu là {} pi",
            format_pi(min_amount_pi)
        )));
    }
    for (field, value) in [
        ("tên ngân hàng", &input.bank_name),
        ("số tài khoản", &input.bank_account_number),
        ("tên chủ tài khoản", &input.bank_account_name),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("Thiếu {}", field)));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct WithdrawalService {
    pool: PgPool,
    wallet: WalletService,
    notifier: NotificationService,
}

impl WithdrawalService {
    pub fn new(pool: PgPool, wallet: WalletService, notifier: NotificationService) -> Self {
        Self {
            pool,
            wallet,
            notifier,
        }
    }

    /// Create a request: validate, rate-limit, then lock the funds and
    /// insert the row in one transaction. The locked amount leaves
    /// `available` immediately so concurrent requests cannot spend the same
    /// balance twice.
    pub async fn create(&self, input: CreateWithdrawal) -> Result<WithdrawalRequest, AppError> {
        let settings = self.wallet.settings();
        validate_request(&input, settings.min_withdrawal_pi)?;

        if queries::has_open_withdrawal(
            &self.pool,
            input.requester_id,
            settings.withdrawal_cooldown_hours,
        )
        .await?
        {
            return Err(AppError::RateLimited(
                "Bạn đã có một yêu cầu rút tiền đang chờ xử lý".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let wallet = queries::get_or_create_wallet(&mut tx, input.requester_id).await?;

        self.wallet
            .lock_for_withdrawal(&mut tx, wallet.id, input.amount_pi)
            .await?;

        let amount_vnd = milli_pi_to_vnd(input.amount_pi, settings.pi_rate_vnd);
        let request = WithdrawalRequest {
            id: Uuid::new_v4(),
            requester_id: input.requester_id,
            wallet_id: wallet.id,
            amount_pi: input.amount_pi,
            amount_vnd,
            bank_name: input.bank_name,
            bank_account_number: input.bank_account_number,
            bank_account_name: input.bank_account_name,
            status: WithdrawalStatus::Pending.as_str().to_string(),
            rejection_reason: None,
            processed_by: None,
            processed_at: None,
            created_at: Utc::now(),
        };
        let request = queries::insert_withdrawal_request(&mut tx, &request).await?;

        let entry = WalletLogEntry::new(
            wallet.id,
            None,
            EntryType::WithdrawalRequest,
            EntryStatus::Released,
            -request.amount_pi,
            -request.amount_vnd,
            format!("Yêu cầu rút {} pi", format_pi(request.amount_pi)),
            None,
        );
        queries::insert_wallet_log_entry(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(
            request_id = %request.id,
            requester_id = %request.requester_id,
            amount_pi = request.amount_pi,
            "Withdrawal request created, funds locked"
        );

        Ok(request)
    }

    /// Admin rejection: conditional pending -> rejected, exact unlock.
    pub async fn reject(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
        reason: &str,
    ) -> Result<WithdrawalRequest, AppError> {
        let mut tx = self.pool.begin().await?;
        let request = queries::transition_withdrawal(
            &mut tx,
            request_id,
            WithdrawalStatus::Pending,
            WithdrawalStatus::Rejected,
            admin_id,
            Some(reason),
        )
        .await?
        .ok_or_else(|| self.not_in_state(request_id, WithdrawalStatus::Pending))?;

        self.wallet
            .unlock_on_reject(&mut tx, request.wallet_id, request.amount_pi)
            .await?;

        let entry = WalletLogEntry::new(
            request.wallet_id,
            None,
            EntryType::WithdrawalRejected,
            EntryStatus::Released,
            request.amount_pi,
            request.amount_vnd,
            format!("Yêu cầu rút tiền bị từ chối: {}", reason),
            None,
        );
        queries::insert_wallet_log_entry(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(request_id = %request.id, reason = %reason, "Withdrawal rejected, funds unlocked");

        self.notifier
            .send(
                request.requester_id,
                NotificationKind::WithdrawalRejected,
                format!("Lý do: {}", reason),
            )
            .await;

        Ok(request)
    }

    /// Admin approval: the amount permanently leaves the payable pool; the
    /// actual bank transfer happens out of band.
    pub async fn approve(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
    ) -> Result<WithdrawalRequest, AppError> {
        let mut tx = self.pool.begin().await?;
        let request = queries::transition_withdrawal(
            &mut tx,
            request_id,
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved,
            admin_id,
            None,
        )
        .await?
        .ok_or_else(|| self.not_in_state(request_id, WithdrawalStatus::Pending))?;

        self.wallet
            .finalize_on_approve(&mut tx, request.wallet_id, request.amount_pi)
            .await?;

        let entry = WalletLogEntry::new(
            request.wallet_id,
            None,
            EntryType::WithdrawalApproved,
            EntryStatus::Released,
            0,
            0,
            format!("Duyệt rút {} pi, chờ chuyển khoản", format_pi(request.amount_pi)),
            None,
        );
        queries::insert_wallet_log_entry(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(request_id = %request.id, "Withdrawal approved");

        self.notifier
            .send(
                request.requester_id,
                NotificationKind::WithdrawalApproved,
                format!(
                    "Yêu cầu rút {} pi đã được duyệt, tiền sẽ được chuyển trong 24h",
                    format_pi(request.amount_pi)
                ),
            )
            .await;

        Ok(request)
    }

    /// Record-only: the manual transfer went out, close the request.
    pub async fn complete(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
    ) -> Result<WithdrawalRequest, AppError> {
        let mut tx = self.pool.begin().await?;
        let request = queries::transition_withdrawal(
            &mut tx,
            request_id,
            WithdrawalStatus::Approved,
            WithdrawalStatus::Completed,
            admin_id,
            None,
        )
        .await?
        .ok_or_else(|| self.not_in_state(request_id, WithdrawalStatus::Approved))?;

        let entry = WalletLogEntry::new(
            request.wallet_id,
            None,
            EntryType::WithdrawalCompleted,
            EntryStatus::Released,
            0,
            0,
            format!("Đã chuyển khoản {} VND", request.amount_vnd),
            None,
        );
        queries::insert_wallet_log_entry(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(request_id = %request.id, "Withdrawal completed");

        self.notifier
            .send(
                request.requester_id,
                NotificationKind::WithdrawalCompleted,
                format!("Đã chuyển {} VND vào tài khoản của bạn", request.amount_vnd),
            )
            .await;

        Ok(request)
    }

    /// Guard against double-processing by concurrent admin actions: the
    /// conditional transition found no row in the expected source state.
    fn not_in_state(&self, request_id: Uuid, expected: WithdrawalStatus) -> AppError {
        AppError::Conflict(format!(
            "Withdrawal {} is not {}",
            request_id,
            expected.as_str()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount_pi: i64) -> CreateWithdrawal {
        CreateWithdrawal {
            requester_id: Uuid::new_v4(),
            amount_pi,
            bank_name: "Vietcombank".to_string(),
            bank_account_number: "0123456789".to_string(),
            bank_account_name: "NGUYEN VAN A".to_string(),
        }
    }

    #[test]
    fn accepts_valid_request() {
        assert!(validate_request(&request(5_000), 1_000).is_ok());
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(validate_request(&request(0), 1_000).is_err());
        assert!(validate_request(&request(-500), 1_000).is_err());
    }

    #[test]
    fn rejects_amounts_below_the_floor() {
        assert!(validate_request(&request(999), 1_000).is_err());
        assert!(validate_request(&request(1_000), 1_000).is_ok());
    }

    #[test]
    fn rejects_blank_bank_details() {
        let mut input = request(5_000);
        input.bank_account_number = "   ".to_string();
        assert!(validate_request(&input, 1_000).is_err());
    }
}
