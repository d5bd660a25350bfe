//! HTTP API route definitions.

use axum::{middleware, routing::get, Router};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::docs::ApiDoc;
use super::handlers::{
    get_instance_id, get_user, health, not_found, scrape_metrics, AppState,
};
use crate::metrics::track_http;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/user", get(get_user))
        .route("/api/id", get(get_instance_id))
        .route("/api/health", get(health))
        .route("/metrics", get(scrape_metrics))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(middleware::from_fn(track_http))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open CORS policy: any origin, method and header, with credentials.
///
/// A literal `*` cannot be sent together with credentials, so the request's
/// origin, method and headers are echoed back instead.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
