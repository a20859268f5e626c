pub mod auth;
pub mod config;
pub mod connections;
pub mod db;
pub mod delay_queue;
pub mod error;
pub mod gateway;
pub mod http;
pub mod rate_limit;
pub mod repo;
pub mod room;
pub mod state;
pub mod sweeper;
pub mod validation;

pub use state::AppState;

use axum::{routing::get, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Builds the full router: the single WebSocket upgrade endpoint plus the
/// auxiliary HTTP surface (spec §6). CORS origins come from `cors_origins`,
/// matching the socket transport's own origin policy.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = build_cors_layer(cors_origins);

    Router::new()
        .route("/ws", get(gateway::ws_handler))
        .route("/health", get(http::health::health))
        .route(
            "/api/user/preferences",
            get(http::preferences::get_preferences).patch(http::preferences::patch_preferences),
        )
        .route("/api/user/recent-rooms", get(http::preferences::get_recent_rooms))
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        AllowOrigin::list(parsed)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
