use axum::{body::Bytes, extract::State, response::Html, Json};
use serde::{de::DeserializeOwned, Serialize};

use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub engine: String,
    pub config_path: String,
    pub ffmpeg: bool,
    pub tasks: usize,
    pub active_downloads: usize,
}

#[derive(Serialize)]
pub struct HeartbeatResponse {
    pub status: &'static str,
}

/// UI shell. Loading it counts as a heartbeat.
pub async fn index(State(state): State<AppState>) -> Html<&'static str> {
    state.activity.mark_activity();
    Html(INDEX_HTML)
}

pub async fn heartbeat(State(state): State<AppState>) -> Json<HeartbeatResponse> {
    state.activity.mark_activity();
    Json(HeartbeatResponse { status: "alive" })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: "toolserver",
        engine: state.engine.name().to_string(),
        config_path: state.config.path().display().to_string(),
        ffmpeg: state.ffmpeg,
        tasks: state.registry.len(),
        active_downloads: state.activity.active_downloads(),
    })
}

/// Lenient JSON body: anything missing or malformed reads as the default
/// value, so validation reports the missing field instead of a parse error.
pub(crate) fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}
