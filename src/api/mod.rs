//! REST API module using Axum
//!
//! Thin JSON surface over [`WordListService`](crate::pool::WordListService) for moderation pipelines
//! running in another process. All endpoints live under `/api/v1`.

pub mod envelope;
pub mod handlers;
mod routes;

pub use envelope::ApiError;
pub use handlers::ApiState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::defaults;

/// Environment variable listing allowed CORS origins (comma-separated).
pub const CORS_ORIGINS_ENV_VAR: &str = "WORDLIST_CORS_ORIGINS";

/// CORS for the given origin list. `None` allows same-origin callers only.
fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    let Some(origins) = origins else {
        return layer;
    };

    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    info!(count = allowed.len(), "Cross-origin callers allowed");
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Create the complete application router.
pub fn create_app(state: ApiState) -> Router {
    let origins = std::env::var(CORS_ORIGINS_ENV_VAR).ok();
    Router::new()
        .nest("/api/v1", routes::api_routes(state))
        .layer(DefaultBodyLimit::max(defaults::MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(origins.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    async fn allow_origin_for(origins: Option<&str>, origin: &str) -> Option<HeaderValue> {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(cors_layer(origins));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header(header::ORIGIN, origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).cloned()
    }

    #[tokio::test]
    async fn test_cors_allows_listed_origins_only() {
        let origins = Some("https://mod.example.com, ,https://admin.example.com");
        assert_eq!(
            allow_origin_for(origins, "https://admin.example.com").await,
            Some(HeaderValue::from_static("https://admin.example.com"))
        );
        assert_eq!(allow_origin_for(origins, "https://evil.example.com").await, None);
    }

    #[tokio::test]
    async fn test_cors_unset_is_same_origin_only() {
        assert_eq!(allow_origin_for(None, "https://mod.example.com").await, None);
    }
}
