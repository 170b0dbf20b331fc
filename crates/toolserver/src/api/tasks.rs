//! Task status endpoints.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::{ApiError, ApiResult};
use crate::state::AppState;
use crate::task::Task;

#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,
}

/// Shown by `/api/progress` before any task exists.
#[derive(Debug, Serialize)]
pub struct IdleProgress {
    pub status: &'static str,
    pub percent: u8,
    pub message: &'static str,
    pub eta: Option<u64>,
    pub speed: Option<String>,
    pub downloaded: Option<String>,
    pub total: Option<String>,
}

impl Default for IdleProgress {
    fn default() -> Self {
        Self {
            status: "idle",
            percent: 0,
            message: "",
            eta: None,
            speed: None,
            downloaded: None,
            total: None,
        }
    }
}

/// Newest in-flight task, else newest task, else the idle placeholder.
pub async fn progress(State(state): State<AppState>) -> Response {
    match state.registry.latest_relevant() {
        Some(task) => Json(task).into_response(),
        None => Json(IdleProgress::default()).into_response(),
    }
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<ListTasksResponse> {
    Json(ListTasksResponse {
        tasks: state.registry.list(),
    })
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    state
        .registry
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}
