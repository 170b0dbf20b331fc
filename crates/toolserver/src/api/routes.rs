use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use super::{handlers, media, settings, tasks};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route(
            "/api/heartbeat",
            get(handlers::heartbeat).post(handlers::heartbeat),
        )
        // Tasks
        .route("/api/progress", get(tasks::progress))
        .route("/api/tasks", get(tasks::list_tasks))
        .route("/api/tasks/{id}", get(tasks::get_task))
        // Settings
        .route("/api/pick-folder", get(settings::pick_folder))
        .route(
            "/api/settings",
            get(settings::get_settings).post(settings::update_settings),
        )
        // Media
        .route("/api/info", post(media::info))
        .route("/api/download", post(media::download))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .with_state(state)
}
