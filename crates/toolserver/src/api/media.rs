//! Metadata lookup and download submission.

use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::handlers::json_body;
use super::{ApiError, ApiResult};
use crate::engine::VideoQuality;
use crate::state::AppState;
use crate::task::{MediaFormat, Task};

#[derive(Debug, Default, Deserialize)]
pub struct InfoBody {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: String,
    pub video_qualities: Vec<VideoQuality>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    /// Number or numeric string.
    #[serde(default)]
    pub height: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    pub task_id: String,
    pub task: Task,
}

fn required_url(url: Option<String>) -> ApiResult<String> {
    url.map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("URL is required".to_string()))
}

/// Accepts `720`, `720.0` and `"720"`. `0` means no cap. `None` for
/// anything that is not a non-negative integer.
fn parse_height(raw: &Value) -> Option<Option<u32>> {
    let value = match raw {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => n.as_f64().filter(|f| f.is_finite())?.trunc() as i64,
        },
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    let height = u32::try_from(value).ok()?;
    Some((height > 0).then_some(height))
}

pub async fn info(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<InfoResponse>> {
    state.activity.mark_activity();
    let body: InfoBody = json_body(&body);
    let url = required_url(body.url)?;

    let info = state.engine.fetch_info(&url).await.map_err(|e| {
        warn!(%url, error = %e, "info query failed");
        ApiError::Internal(e.to_string())
    })?;

    Ok(Json(InfoResponse {
        video_qualities: info.video_qualities(),
        title: info.title,
        thumbnail: info.thumbnail,
        duration: info.duration.unwrap_or_default(),
    }))
}

/// Validates the request, registers a task and starts it in the background.
pub async fn download(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<DownloadResponse>> {
    state.activity.mark_activity();
    let body: DownloadBody = json_body(&body);

    let url = required_url(body.url)?;
    let format = match body.format.as_deref().map(str::trim) {
        None | Some("") => MediaFormat::Video,
        Some(raw) => MediaFormat::parse(raw)
            .ok_or_else(|| ApiError::BadRequest("Invalid format".to_string()))?,
    };

    let height = match (format, body.height.as_ref()) {
        (MediaFormat::Video, Some(raw)) if !raw.is_null() => {
            parse_height(raw).ok_or_else(|| ApiError::BadRequest("Invalid quality".to_string()))?
        }
        _ => None,
    };

    let task = state.registry.create(url, format, height);
    info!(task_id = %task.id, url = %task.url, %format, ?height, "download queued");
    // detached; progress is read back through the registry
    drop(state.orchestrator.spawn(task.id.clone()));

    Ok(Json(DownloadResponse {
        success: true,
        task_id: task.id.clone(),
        task,
    }))
}
