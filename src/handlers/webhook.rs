//! Inbound event intake: bank transfer notifications (HMAC-signed),
//! buyer receipt confirmations and dispute events.

use crate::AppState;
use crate::db::models::{EntryType, NotificationKind};
use crate::db::queries;
use crate::error::AppError;
use crate::services::dispute::DisputeResolution;
use crate::services::matcher::IncomingTransfer;
use crate::services::wallet::format_pi;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize, Serialize)]
pub struct TransferNotification {
    pub external_id: String,
    pub amount: i64,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub source_account: String,
}

/// Bank transfer callback. The signature covers the raw body, so the body
/// is taken as bytes and parsed only after verification.
pub async fn bank_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing webhook signature".to_string()))?;
    verify_signature(state.config.bank_webhook_secret.as_bytes(), &body, signature)?;

    let payload: TransferNotification = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid payload: {}", e)))?;

    if payload.external_id.trim().is_empty() {
        return Err(AppError::Validation("external_id must not be empty".to_string()));
    }
    if payload.amount <= 0 {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }

    let outcome = state
        .matcher
        .ingest(IncomingTransfer {
            external_id: payload.external_id,
            amount_vnd: payload.amount,
            description: payload.description,
            occurred_at: payload.occurred_at,
            source_account: payload.source_account,
        })
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

/// Constant-time HMAC-SHA256 verification over the raw request body.
pub fn verify_signature(secret: &[u8], body: &[u8], signature_hex: &str) -> Result<(), AppError> {
    let signature = hex::decode(signature_hex)
        .map_err(|_| AppError::Unauthorized("Malformed webhook signature".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| AppError::Internal("Webhook secret unusable".to_string()))?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized("Invalid webhook signature".to_string()))
}

/// Buyer confirmed receipt: release the order's pending funds immediately,
/// ahead of the escrow window. Racing the scheduler is fine; a zero result
/// just means everything was already released.
pub async fn confirm_receipt(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let order = queries::get_order(&state.db, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

    let released = state
        .wallet
        .release_for_order(order_id, EntryType::ServiceCompletion)
        .await?;

    if released > 0 {
        state
            .notifier
            .send(
                order.seller_id,
                NotificationKind::FundsReleased,
                format!(
                    "Người mua đã nhận hàng, {} pi chuyển sang khả dụng",
                    format_pi(released)
                ),
            )
            .await;
    }

    Ok(Json(json!({
        "order_id": order_id,
        "released_pi": released,
    })))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeEvent {
    Opened,
    Resolved,
}

#[derive(Debug, Deserialize)]
pub struct DisputeNotice {
    pub order_id: Uuid,
    pub event: DisputeEvent,
    pub resolution: Option<DisputeResolution>,
}

pub async fn dispute_event(
    State(state): State<AppState>,
    Json(notice): Json<DisputeNotice>,
) -> Result<Response, AppError> {
    match notice.event {
        DisputeEvent::Opened => {
            state.disputes.open(notice.order_id).await?;
            Ok(Json(json!({"order_id": notice.order_id, "status": "disputed"})).into_response())
        }
        DisputeEvent::Resolved => {
            let resolution = notice.resolution.ok_or_else(|| {
                AppError::BadRequest("resolution is required for resolved events".to_string())
            })?;
            let outcome = state.disputes.resolve(notice.order_id, resolution).await?;
            Ok(Json(outcome).into_response())
        }
    }
}
