use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub counts: Counts,
    /// Name of the currently active zone, if any.
    pub active_zone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Counts {
    pub players: usize,
    pub zones: usize,
    pub race_results: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store.read().await;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        counts: Counts {
            players: store.players.len(),
            zones: store.zones.len(),
            race_results: store.race_results.len(),
        },
        active_zone: store.active_zone().map(|z| z.name.clone()),
    })
}
