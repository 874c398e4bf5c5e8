use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/challenges", get(handlers::list_challenges))
        .route("/challenges/today", get(handlers::get_today))
        .route("/challenges/:id", get(handlers::get_challenge))
        .route("/validate", post(handlers::validate_submission))
        .route("/progress/:user_id", get(handlers::get_progress))
        .route("/metrics", get(handlers::get_metrics))
}
