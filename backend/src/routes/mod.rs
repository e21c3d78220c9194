//! Route definitions for the MRP Back Office

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Production plan lifecycle
        .nest("/plans", plan_routes())
        // Goods movements and lot queries
        .nest("/stock", stock_routes())
}

/// Production plan routes
fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_plans).post(handlers::create_plan))
        .route("/:plan_id", get(handlers::get_plan))
        // Read-only requirement preview; safe to call repeatedly
        .route("/:plan_id/requirements", get(handlers::preview_requirements))
        // Lifecycle transitions
        .route("/:plan_id/confirm", post(handlers::confirm_plan))
        .route("/:plan_id/start", post(handlers::start_plan))
        .route("/:plan_id/complete", post(handlers::complete_plan))
        .route("/:plan_id/cancel", post(handlers::cancel_plan))
}

/// Stock movement and lot routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        // Goods movements (each appends ledger rows atomically)
        .route("/receipts", post(handlers::receive_goods))
        .route("/issues", post(handlers::issue_goods))
        .route("/transfers", post(handlers::transfer_goods))
        .route("/adjustments", post(handlers::adjust_stock))
        // Lot queries
        .route("/lots", get(handlers::list_lots))
        .route("/lots/:lot_id", get(handlers::get_lot))
        .route("/lots/:lot_id/ledger", get(handlers::get_lot_ledger))
        // Ledger replay check (audit/repair, not a live-read path)
        .route("/lots/:lot_id/verify", get(handlers::verify_lot))
}
