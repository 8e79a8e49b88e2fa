//! Liveness and loaded-model report

use axum::{extract::State, Json};
use dweeplingo_core::Direction;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models_loaded: Vec<Direction>,
    pub mode: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        models_loaded: state.registry.loaded(),
        mode: "offline",
    })
}
