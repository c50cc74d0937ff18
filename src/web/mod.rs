//! # Web API Module
//!
//! REST surface over the workflow engine. Routes delegate to the engine
//! components held in [`AppState`]; the identity middleware materializes the
//! upstream auth layer's current-user capability for protected routes.

use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub mod handlers;
pub mod middleware;
pub mod response_types;
pub mod state;

pub use response_types::{ApiError, ApiResult};
pub use state::AppState;

/// Create the web application with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let common_middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_millis(
            state.config.request_timeout_ms,
        )))
        .layer(cors);

    // Public routes: probes only
    let public_routes = Router::new().route("/health", get(handlers::health::health_check));

    // Everything else requires a resolved identity
    let protected_routes = Router::new()
        .route("/v1/workflows", post(handlers::workflows::create_workflow))
        .route(
            "/v1/workflows/my-workflows",
            get(handlers::workflows::my_workflows),
        )
        .route(
            "/v1/workflows/bulk-auto-close",
            post(handlers::workflows::bulk_auto_close),
        )
        .route(
            "/v1/workflows/automation-rules",
            get(handlers::automation::list_rules),
        )
        .route("/v1/workflows/{id}", get(handlers::workflows::get_workflow))
        .route(
            "/v1/workflows/{id}/steps",
            get(handlers::workflows::list_steps),
        )
        .route(
            "/v1/workflows/{id}/steps/{step_id}",
            put(handlers::steps::apply_transition),
        )
        .route(
            "/v1/workflows/{id}/steps/{step_id}/auto-transition",
            put(handlers::steps::force_auto_transition),
        )
        .route(
            "/v1/workflows/{id}/documents",
            post(handlers::documents::upload_document).get(handlers::documents::list_documents),
        )
        .layer(axum::middleware::from_fn(middleware::identity::identify));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(common_middleware)
        .with_state(state)
}
