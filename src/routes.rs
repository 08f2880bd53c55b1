use crate::handlers::{env_report, health_check, plan_handler};
use axum::{Router, routing::get, routing::post};

/// Creates and configures all application routes
pub fn create_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/ai", post(plan_handler))
        .route("/api/test-env", get(env_report))
}
