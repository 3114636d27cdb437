//! # campus-api
//!
//! REST API layer for Campus. Provides HTTP endpoints for channel and message
//! CRUD, the membership workflow, and role administration.

pub mod limiter;
pub mod middleware;
pub mod routes;

use axum::Router;
use campus_gateway::backplane::Backplane;
use std::sync::Arc;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: campus_db::Database,
    /// Pub/sub backplane shared with the gateway. API mutations (message
    /// create, role grant, channel permission update) publish here so every
    /// gateway process pushes the event to its connected clients.
    pub backplane: Arc<dyn Backplane>,
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let api_routes = Router::new()
        .merge(routes::health::router())
        .merge(routes::channels::router())
        .merge(routes::messages::router())
        .merge(routes::memberships::router())
        .merge(routes::roles::router())
        // General-scope ceiling on all API traffic, keyed by the forwarded
        // client address.
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(state)
}
