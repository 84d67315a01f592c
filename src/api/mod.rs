use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::get_health))
        .route("/api/prediction", get(handlers::get_prediction))
        .route("/api/comparison", get(handlers::get_comparison))
        .with_state(state)
}
