//! In-process server fixture with mock engine and picker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ytmedia_toolserver::testing::{MockEngine, MockFolderPicker};
use ytmedia_toolserver::{api::create_router, ActivityMonitor, AppState, ConfigStore, TaskStatus};

pub struct TestFixture {
    pub router: Router,
    pub state: AppState,
    pub engine: Arc<MockEngine>,
    /// Default download path reported before any settings are saved.
    pub downloads_dir: PathBuf,
    pub temp_dir: TempDir,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_engine(MockEngine::succeeding("Test Title"))
    }

    pub fn with_engine(engine: MockEngine) -> Self {
        Self::with_engine_and_picker(engine, MockFolderPicker::Cancelled)
    }

    pub fn with_engine_and_picker(engine: MockEngine, picker: MockFolderPicker) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let downloads_dir = temp_dir.path().join("Downloads");
        let config = ConfigStore::with_default_download_dir(temp_dir.path().join("config"), &downloads_dir);

        let engine = Arc::new(engine);
        let state = AppState::new(
            Arc::new(config),
            Arc::new(ActivityMonitor::default()),
            Arc::clone(&engine) as Arc<dyn ytmedia_toolserver::MediaEngine>,
            Arc::new(picker),
            false,
        );
        let router = create_router(state.clone());

        Self {
            router,
            state,
            engine,
            downloads_dir,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body.to_string())).await
    }

    /// POST with a raw (possibly malformed) body.
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string())).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<String>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("Content-Type", "application/json");
        }
        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Polls the task until it reaches `success` or `error`.
    pub async fn wait_for_terminal(&self, task_id: &str) -> Value {
        for _ in 0..200 {
            let task = self.state.registry.get(task_id).expect("task exists");
            if task.status.is_terminal() {
                return serde_json::to_value(task).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} never finished");
    }

    pub async fn wait_for_idle(&self) {
        for _ in 0..200 {
            let all_done = self
                .state
                .registry
                .list()
                .iter()
                .all(|t| matches!(t.status, TaskStatus::Success | TaskStatus::Error));
            if all_done && self.state.activity.active_downloads() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("downloads never settled");
    }
}
