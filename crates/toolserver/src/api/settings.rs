//! Output folder configuration endpoints.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::handlers::json_body;
use super::{ApiError, ApiResult};
use crate::config::{ConfigError, UserConfig};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsBody {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateSettingsResponse {
    pub success: bool,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct PickFolderResponse {
    pub path: String,
}

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<UserConfig>> {
    let config = Arc::clone(&state.config);
    let current = tokio::task::spawn_blocking(move || config.load())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(current))
}

pub async fn update_settings(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<UpdateSettingsResponse>> {
    let body: UpdateSettingsBody = json_body(&body);
    let raw = body
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Path is required".to_string()))?;

    let config = Arc::clone(&state.config);
    let result = tokio::task::spawn_blocking(move || config.set_download_path(&raw))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match result {
        Ok(path) => Ok(Json(UpdateSettingsResponse {
            success: true,
            path: path.display().to_string(),
        })),
        Err(ConfigError::CreateDir { source, .. }) => Err(ApiError::BadRequest(format!(
            "Could not create directory: {source}"
        ))),
        Err(e) => {
            warn!(error = %e, "failed to persist settings");
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

pub async fn pick_folder(State(state): State<AppState>) -> ApiResult<Json<PickFolderResponse>> {
    match state.picker.pick_folder().await {
        Ok(Some(path)) => Ok(Json(PickFolderResponse {
            path: path.display().to_string(),
        })),
        Ok(None) => Err(ApiError::BadRequest("No folder selected".to_string())),
        Err(e) => {
            warn!(error = %e, "folder picker failed");
            Err(ApiError::Internal(e.to_string()))
        }
    }
}
