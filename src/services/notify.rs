//! Outbound notification events, persisted as rows for the (external)
//! delivery subsystem to fan out over push/email/IM.

use crate::db::models::{Notification, NotificationKind};
use crate::db::queries;
use chrono::Utc;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Best effort: a failed notification is logged and dropped, it never
    /// fails the money path that triggered it.
    pub async fn send(&self, user_id: Uuid, kind: NotificationKind, body: String) {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.as_str().to_string(),
            title: kind.title().to_string(),
            body,
            created_at: Utc::now(),
        };

        if let Err(e) = queries::insert_notification(&self.pool, &notification).await {
            error!(
                user_id = %user_id,
                kind = kind.as_str(),
                error = %e,
                "Failed to record notification"
            );
        }
    }
}
