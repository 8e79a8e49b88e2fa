//! API routes

mod health;
mod translate;

use axum::{
    routing::{get, post},
    Router,
};
use dweeplingo_core::ServerConfig;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::state::AppState;

pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let frontend = &config.frontend_dir;

    let router = Router::new()
        .route("/translate", post(translate::translate))
        .route("/health", get(health::health))
        // Frontend
        .route_service("/", ServeFile::new(frontend.join("index.html")))
        .nest_service("/static", ServeDir::new(frontend))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
