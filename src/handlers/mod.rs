pub mod jobs;
pub mod wallets;
pub mod webhook;
pub mod withdrawals;

use crate::AppState;
use crate::error::AppError;
use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let response = HealthStatus {
        status: if db_status == "connected" {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: db_status.to_string(),
    };

    let status_code = if db_status == "connected" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// Gate for admin/internal routes: a shared token in `x-admin-token`.
/// Operator identity travels in the request payloads; session management is
/// the platform's concern, not this engine's.
pub async fn admin_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get("x-admin-token")
        .and_then(|value| value.to_str().ok());

    if token != Some(state.config.admin_api_token.as_str()) {
        return AppError::Unauthorized("Invalid admin token".to_string()).into_response();
    }

    next.run(request).await
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 200)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let pagination = Pagination {
            limit: None,
            offset: None,
        };
        assert_eq!(pagination.limit(), 20);
        assert_eq!(pagination.offset(), 0);

        let pagination = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(pagination.limit(), 200);
        assert_eq!(pagination.offset(), 0);
    }
}
