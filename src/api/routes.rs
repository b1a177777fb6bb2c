//! API route definitions
//!
//! - /api/v1/health - pool status and saturation
//! - /api/v1/wordlists - broadcast a word list to every worker
//! - /api/v1/wordlists/:tenant/:category - replication status
//! - /api/v1/process - evaluate text against a word list
//! - /api/v1/sanitize - canonical markup for a text

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};

/// Create all v1 API routes
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/wordlists", post(handlers::initialize_word_list))
        .route(
            "/wordlists/:tenant/:category",
            get(handlers::get_replication_status),
        )
        .route("/process", post(handlers::process_text))
        .route("/sanitize", post(handlers::sanitize_text))
        .with_state(state)
}
