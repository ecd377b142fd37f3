pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis API
        .route("/api/v1/analysis", post(handlers::handle_start_analysis))
        .route(
            "/api/v1/analysis/history",
            get(handlers::handle_analysis_history),
        )
        .route(
            "/api/v1/analysis/cleanup",
            post(handlers::handle_cleanup_old_analyses),
        )
        .route(
            "/api/v1/analysis/health",
            get(handlers::handle_analysis_health),
        )
        .route(
            "/api/v1/analysis/:id/progress",
            get(handlers::handle_get_progress),
        )
        .route(
            "/api/v1/analysis/:id/results",
            get(handlers::handle_get_results),
        )
        .route(
            "/api/v1/analysis/:id/cancel",
            post(handlers::handle_cancel_analysis),
        )
        .with_state(state)
}
