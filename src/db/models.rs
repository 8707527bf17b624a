use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// --- Closed status/type enumerations ---
//
// Rows carry TEXT columns; every write and every behavioral branch goes
// through these enums so consumers match exhaustively.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
    Disputed,
    Refunded,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Disputed => "disputed",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Completed => "completed",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "disputed" => Ok(OrderStatus::Disputed),
            "refunded" => Ok(OrderStatus::Refunded),
            "completed" => Ok(OrderStatus::Completed),
            other => Err(UnknownVariant("order status", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Earning,
    DisputeHold,
    DisputeRelease,
    DisputeRefund,
    WithdrawalRequest,
    WithdrawalApproved,
    WithdrawalRejected,
    WithdrawalCompleted,
    ServiceCompletion,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Earning => "earning",
            EntryType::DisputeHold => "dispute_hold",
            EntryType::DisputeRelease => "dispute_release",
            EntryType::DisputeRefund => "dispute_refund",
            EntryType::WithdrawalRequest => "withdrawal_request",
            EntryType::WithdrawalApproved => "withdrawal_approved",
            EntryType::WithdrawalRejected => "withdrawal_rejected",
            EntryType::WithdrawalCompleted => "withdrawal_completed",
            EntryType::ServiceCompletion => "service_completion",
        }
    }
}

impl FromStr for EntryType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "earning" => Ok(EntryType::Earning),
            "dispute_hold" => Ok(EntryType::DisputeHold),
            "dispute_release" => Ok(EntryType::DisputeRelease),
            "dispute_refund" => Ok(EntryType::DisputeRefund),
            "withdrawal_request" => Ok(EntryType::WithdrawalRequest),
            "withdrawal_approved" => Ok(EntryType::WithdrawalApproved),
            "withdrawal_rejected" => Ok(EntryType::WithdrawalRejected),
            "withdrawal_completed" => Ok(EntryType::WithdrawalCompleted),
            "service_completion" => Ok(EntryType::ServiceCompletion),
            other => Err(UnknownVariant("entry type", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Released,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Released => "released",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Completed => "completed",
        }
    }
}

impl FromStr for WithdrawalStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            "completed" => Ok(WithdrawalStatus::Completed),
            other => Err(UnknownVariant("withdrawal status", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PaymentVerified,
    FundsReleased,
    DisputeOpened,
    DisputeResolved,
    WithdrawalApproved,
    WithdrawalRejected,
    WithdrawalCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PaymentVerified => "payment_verified",
            NotificationKind::FundsReleased => "funds_released",
            NotificationKind::DisputeOpened => "dispute_opened",
            NotificationKind::DisputeResolved => "dispute_resolved",
            NotificationKind::WithdrawalApproved => "withdrawal_approved",
            NotificationKind::WithdrawalRejected => "withdrawal_rejected",
            NotificationKind::WithdrawalCompleted => "withdrawal_completed",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::PaymentVerified => "Thanh toán đã được xác nhận",
            NotificationKind::FundsReleased => "Số dư đã sẵn sàng",
            NotificationKind::DisputeOpened => "Đơn hàng đang bị khiếu nại",
            NotificationKind::DisputeResolved => "Khiếu nại đã được xử lý",
            NotificationKind::WithdrawalApproved => "Yêu cầu rút tiền được duyệt",
            NotificationKind::WithdrawalRejected => "Yêu cầu rút tiền bị từ chối",
            NotificationKind::WithdrawalCompleted => "Rút tiền thành công",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub &'static str, pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.0, self.1)
    }
}

impl std::error::Error for UnknownVariant {}

// --- Row models ---

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub product_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub amount_vnd: i64,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub matched_tx_id: Option<Uuid>,
    pub delivery_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Compact lowercase hex form of the identifier, as it appears inside
    /// bank-transfer descriptions.
    pub fn compact_id(&self) -> String {
        self.id.simple().to_string()
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: Uuid,
    pub external_id: String,
    pub order_id: Uuid,
    pub amount_vnd: i64,
    pub description: String,
    pub source_account: String,
    pub occurred_at: DateTime<Utc>,
    pub matched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UnmatchedTransaction {
    pub id: Uuid,
    pub external_id: String,
    pub amount_vnd: i64,
    pub description: String,
    pub source_account: String,
    pub occurred_at: DateTime<Utc>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub pending_pi: i64,
    pub available_pi: i64,
    pub total_earned_pi: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletLogEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub order_id: Option<Uuid>,
    pub entry_type: String,
    pub status: String,
    pub amount_pi: i64,
    pub amount_vnd: i64,
    pub description: String,
    pub release_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WalletLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wallet_id: Uuid,
        order_id: Option<Uuid>,
        entry_type: EntryType,
        status: EntryStatus,
        amount_pi: i64,
        amount_vnd: i64,
        description: String,
        release_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            order_id,
            entry_type: entry_type.as_str().to_string(),
            status: status.as_str().to_string(),
            amount_pi,
            amount_vnd,
            description,
            release_at,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub wallet_id: Uuid,
    pub amount_pi: i64,
    pub amount_vnd: i64,
    pub bank_name: String,
    pub bank_account_number: String,
    pub bank_account_name: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_round_trips() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
            OrderStatus::Disputed,
            OrderStatus::Refunded,
            OrderStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn entry_type_round_trips() {
        for entry_type in [
            EntryType::Earning,
            EntryType::DisputeHold,
            EntryType::DisputeRelease,
            EntryType::DisputeRefund,
            EntryType::WithdrawalRequest,
            EntryType::WithdrawalApproved,
            EntryType::WithdrawalRejected,
            EntryType::WithdrawalCompleted,
            EntryType::ServiceCompletion,
        ] {
            assert_eq!(entry_type.as_str().parse::<EntryType>().unwrap(), entry_type);
        }
    }

    #[test]
    fn withdrawal_status_rejects_unknown() {
        assert!("shipped".parse::<WithdrawalStatus>().is_err());
    }

    #[test]
    fn compact_id_matches_canonical_form() {
        let id = Uuid::parse_str("4d3d37ed-ec53-f1a0-0000-000000000000").unwrap();
        let order = Order {
            id,
            product_id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            amount_vnd: 150_000,
            status: OrderStatus::Pending.as_str().to_string(),
            paid_at: None,
            matched_tx_id: None,
            delivery_status: "not_started".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(order.compact_id(), "4d3d37edec53f1a00000000000000000");
    }
}
