pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod services;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use config::Config;
use services::backfill::BackfillJob;
use services::dispute::DisputeService;
use services::matcher::PaymentMatcher;
use services::notify::NotificationService;
use services::reconcile::ReconcileSweep;
use services::release::ReleaseSweep;
use services::wallet::WalletService;
use services::withdrawal::WithdrawalService;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub wallet: WalletService,
    pub notifier: NotificationService,
    pub matcher: PaymentMatcher,
    pub disputes: DisputeService,
    pub withdrawals: WithdrawalService,
    pub release_sweep: ReleaseSweep,
    pub reconcile_sweep: ReconcileSweep,
    pub backfill: BackfillJob,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        let wallet = WalletService::new(db.clone(), config.engine.clone());
        let notifier = NotificationService::new(db.clone());
        Self {
            matcher: PaymentMatcher::new(db.clone(), wallet.clone(), notifier.clone()),
            disputes: DisputeService::new(db.clone(), wallet.clone(), notifier.clone()),
            withdrawals: WithdrawalService::new(db.clone(), wallet.clone(), notifier.clone()),
            release_sweep: ReleaseSweep::new(db.clone(), wallet.clone()),
            reconcile_sweep: ReconcileSweep::new(db.clone(), wallet.clone(), notifier.clone()),
            backfill: BackfillJob::new(db.clone(), wallet.clone()),
            wallet,
            notifier,
            db,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/webhooks/disputes", post(handlers::webhook::dispute_event))
        .route(
            "/orders/:id/confirm-receipt",
            post(handlers::webhook::confirm_receipt),
        )
        .route(
            "/withdrawals/:id/approve",
            post(handlers::withdrawals::approve),
        )
        .route(
            "/withdrawals/:id/reject",
            post(handlers::withdrawals::reject),
        )
        .route(
            "/withdrawals/:id/complete",
            post(handlers::withdrawals::complete),
        )
        .route("/jobs/release-sweep", post(handlers::jobs::release_sweep))
        .route("/jobs/reconcile", post(handlers::jobs::reconcile))
        .route("/jobs/backfill", post(handlers::jobs::backfill))
        .route(
            "/transactions/unmatched",
            get(handlers::jobs::list_unmatched),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::admin_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/bank", post(handlers::webhook::bank_callback))
        .route("/withdrawals", post(handlers::withdrawals::create))
        .route("/withdrawals/:id", get(handlers::withdrawals::get_withdrawal))
        .route("/wallets/:owner_id", get(handlers::wallets::get_wallet))
        .route(
            "/wallets/:owner_id/entries",
            get(handlers::wallets::list_entries),
        )
        .route(
            "/wallets/:owner_id/integrity",
            get(handlers::wallets::integrity),
        )
        .merge(admin)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
