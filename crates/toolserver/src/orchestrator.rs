//! Drives one task through the media engine.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::activity::ActivityMonitor;
use crate::config::ConfigStore;
use crate::engine::{DownloadRequest, MediaEngine, ProgressEvent, ProgressSink};
use crate::registry::TaskRegistry;
use crate::task::{TaskStatus, TaskUpdate};

#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<TaskRegistry>,
    activity: Arc<ActivityMonitor>,
    config: Arc<ConfigStore>,
    engine: Arc<dyn MediaEngine>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<TaskRegistry>,
        activity: Arc<ActivityMonitor>,
        config: Arc<ConfigStore>,
        engine: Arc<dyn MediaEngine>,
    ) -> Self {
        Self {
            registry,
            activity,
            config,
            engine,
        }
    }

    /// Runs the task on the tokio pool. Every spawn is independent; there is
    /// no cap on concurrent downloads.
    pub fn spawn(&self, task_id: String) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run(&task_id).await })
    }

    /// Downloads the task to completion. Outcome is only visible through the
    /// registry.
    pub async fn run(&self, task_id: &str) {
        let Some(task) = self.registry.get(task_id) else {
            warn!(task_id, "task vanished before download started");
            return;
        };

        let config = Arc::clone(&self.config);
        let format = task.format;
        let prepared = tokio::task::spawn_blocking(move || config.target_dir(format))
            .await
            .map_err(|e| e.to_string())
            .and_then(|dir| dir.map_err(|e| e.to_string()));
        let target_dir = match prepared {
            Ok(dir) => dir,
            Err(message) => {
                warn!(task_id, error = %message, "could not prepare output directory");
                self.fail(task_id, message, None);
                return;
            }
        };
        let target = target_dir.display().to_string();

        if let Err(e) = self.registry.update(
            task_id,
            TaskUpdate::new()
                .status(TaskStatus::Downloading)
                .percent(0)
                .message("Starting download...")
                .target_dir(Some(target.clone()))
                .error(None),
        ) {
            warn!(task_id, error = %e, "could not start task");
            return;
        }

        let _active = self.activity.begin_download();
        info!(task_id, url = %task.url, format = %task.format, dir = %target, "download started");

        let request = DownloadRequest {
            url: task.url.clone(),
            format: task.format,
            height: task.height,
            target_dir: target_dir.clone(),
        };
        let sink = TaskProgress {
            registry: &self.registry,
            activity: &self.activity,
            task_id,
            target_dir: &target,
        };

        match self.engine.download(&request, &sink).await {
            Ok(outcome) => {
                info!(task_id, title = %outcome.title, "download finished");
                self.succeed(task_id, outcome.title, &target_dir);
            }
            Err(e) => {
                warn!(task_id, error = %e, "download failed");
                self.fail(task_id, e.to_string(), Some(target));
            }
        }
    }

    fn succeed(&self, task_id: &str, title: String, target_dir: &Path) {
        let update = TaskUpdate::new()
            .status(TaskStatus::Success)
            .percent(100)
            .title(Some(title))
            .message(format!("Downloaded to {}", target_dir.display()))
            .eta(Some(0))
            .speed(None)
            .error(None);
        if let Err(e) = self.registry.update(task_id, update) {
            warn!(task_id, error = %e, "could not record success");
        }
    }

    fn fail(&self, task_id: &str, message: String, target_dir: Option<String>) {
        let mut update = TaskUpdate::new()
            .status(TaskStatus::Error)
            .message(message.clone())
            .error(Some(message))
            .speed(None);
        if target_dir.is_some() {
            update = update.target_dir(target_dir);
        }
        if let Err(e) = self.registry.update(task_id, update) {
            warn!(task_id, error = %e, "could not record failure");
        }
    }
}

/// Progress sink bound to one task.
struct TaskProgress<'a> {
    registry: &'a TaskRegistry,
    activity: &'a ActivityMonitor,
    task_id: &'a str,
    target_dir: &'a str,
}

impl ProgressSink for TaskProgress<'_> {
    fn on_progress(&self, event: ProgressEvent) {
        // engine output counts as liveness
        self.activity.mark_activity();

        let update = match event {
            ProgressEvent::Downloading(progress) => {
                let mut update = TaskUpdate::new()
                    .status(TaskStatus::Downloading)
                    .message("Downloading...")
                    .eta(progress.eta_secs)
                    .speed(progress.speed_bytes_per_sec.and_then(format_speed))
                    .downloaded(progress.downloaded_bytes.map(format_bytes))
                    .total(progress.total_bytes.map(format_bytes))
                    .target_dir(Some(self.target_dir.to_string()));
                if let Some(percent) = progress.percent() {
                    update = update.percent(percent);
                }
                update
            }
            ProgressEvent::Finished => TaskUpdate::new()
                .status(TaskStatus::Processing)
                .percent(100)
                .message("Download finished. Processing file...")
                .eta(Some(0))
                .speed(None),
        };

        if let Err(e) = self.registry.update(self.task_id, update) {
            debug!(task_id = self.task_id, error = %e, "progress update ignored");
        }
    }
}

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// `1536` -> `"1.5 KiB"`.
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub fn format_speed(bytes_per_sec: f64) -> Option<String> {
    if !bytes_per_sec.is_finite() || bytes_per_sec < 0.0 {
        return None;
    }
    Some(format!("{}/s", format_bytes(bytes_per_sec as u64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TransferProgress;
    use crate::task::MediaFormat;
    use crate::testing::MockEngine;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        base: std::path::PathBuf,
        registry: Arc<TaskRegistry>,
        activity: Arc<ActivityMonitor>,
        engine: Arc<MockEngine>,
        orchestrator: Orchestrator,
    }

    fn fixture(engine: MockEngine) -> Fixture {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("Downloads");
        let registry = Arc::new(TaskRegistry::new());
        let activity = Arc::new(ActivityMonitor::default());
        let config = Arc::new(ConfigStore::with_default_download_dir(dir.path().join("cfg"), &base));
        let engine = Arc::new(engine);
        let orchestrator = Orchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&activity),
            config,
            Arc::clone(&engine) as Arc<dyn MediaEngine>,
        );
        Fixture {
            _dir: dir,
            base,
            registry,
            activity,
            engine,
            orchestrator,
        }
    }

    fn downloading(downloaded: u64, total: Option<u64>) -> ProgressEvent {
        ProgressEvent::Downloading(TransferProgress {
            downloaded_bytes: Some(downloaded),
            total_bytes: total,
            eta_secs: Some(5),
            speed_bytes_per_sec: Some(2048.0),
        })
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(0), "0.0 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(format_bytes(u64::MAX), "16777216.0 TiB");
        assert_eq!(format_speed(2048.0).as_deref(), Some("2.0 KiB/s"));
        assert_eq!(format_speed(f64::NAN), None);
    }

    #[tokio::test]
    async fn audio_download_succeeds_into_audios_dir() {
        let f = fixture(MockEngine::succeeding("My Song"));
        let task = f.registry.create("https://example.com/a", MediaFormat::Audio, None);

        f.orchestrator.run(&task.id).await;

        let done = f.registry.get(&task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Success);
        assert_eq!(done.percent, 100);
        assert_eq!(done.title.as_deref(), Some("My Song"));
        assert!(done.error.is_none());
        let target = f.base.join("audios");
        assert_eq!(done.target_dir, Some(target.display().to_string()));
        assert_eq!(done.message, format!("Downloaded to {}", target.display()));
        assert!(target.is_dir());

        let requests = f.engine.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target_dir, target);
        assert_eq!(f.activity.active_downloads(), 0);
    }

    #[tokio::test]
    async fn engine_failure_is_passed_through() {
        let f = fixture(MockEngine::failing("ERROR: Video unavailable"));
        let task = f.registry.create("https://example.com/v", MediaFormat::Video, Some(480));

        f.orchestrator.run(&task.id).await;

        let done = f.registry.get(&task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Error);
        assert_eq!(done.error.as_deref(), Some("ERROR: Video unavailable"));
        assert_eq!(done.message, "ERROR: Video unavailable");
        assert!(done.speed.is_none());
        assert!(done.target_dir.unwrap().ends_with("videos"));
        assert_eq!(f.engine.recorded_requests()[0].height, Some(480));
        assert_eq!(f.activity.active_downloads(), 0);
    }

    /// Records the task snapshot after every progress event.
    struct ObservingEngine {
        inner: MockEngine,
        registry: Arc<TaskRegistry>,
        seen: std::sync::Mutex<Vec<(TaskStatus, u8)>>,
    }

    struct ObservingSink<'a> {
        inner: &'a dyn ProgressSink,
        engine: &'a ObservingEngine,
    }

    impl ProgressSink for ObservingSink<'_> {
        fn on_progress(&self, event: ProgressEvent) {
            self.inner.on_progress(event);
            let task = self.engine.registry.list().pop().unwrap();
            self.engine.seen.lock().unwrap().push((task.status, task.percent));
        }
    }

    #[async_trait::async_trait]
    impl MediaEngine for ObservingEngine {
        fn name(&self) -> &str {
            "observing"
        }

        async fn fetch_info(&self, url: &str) -> Result<crate::engine::MediaInfo, crate::engine::EngineError> {
            self.inner.fetch_info(url).await
        }

        async fn download(
            &self,
            request: &DownloadRequest,
            sink: &dyn ProgressSink,
        ) -> Result<crate::engine::DownloadOutcome, crate::engine::EngineError> {
            let observing = ObservingSink { inner: sink, engine: self };
            self.inner.download(request, &observing).await
        }
    }

    #[tokio::test]
    async fn progress_events_drive_the_state_machine() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        let engine = Arc::new(ObservingEngine {
            inner: MockEngine::succeeding("Clip").with_events(vec![
                downloading(0, None),
                downloading(256, Some(1024)),
                downloading(512, None),
                downloading(1024, Some(1024)),
                ProgressEvent::Finished,
                // second stream of a merged download
                downloading(10, Some(1000)),
                ProgressEvent::Finished,
            ]),
            registry: Arc::clone(&registry),
            seen: Default::default(),
        });
        let orchestrator = Orchestrator::new(
            Arc::clone(&registry),
            Arc::new(ActivityMonitor::default()),
            Arc::new(ConfigStore::with_default_download_dir(
                dir.path().join("cfg"),
                dir.path().join("Downloads"),
            )),
            Arc::clone(&engine) as Arc<dyn MediaEngine>,
        );
        let task = registry.create("https://example.com/v", MediaFormat::Video, None);

        orchestrator.run(&task.id).await;

        let seen = engine.seen.lock().unwrap().clone();
        let percents: Vec<u8> = seen.iter().map(|(_, p)| *p).collect();
        assert_eq!(seen.len(), 7);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
        assert_eq!(percents[1], 25);
        assert_eq!(percents[2], 25, "percent held without a total");
        assert_eq!(percents[4], 100);
        assert_eq!(percents[5], 100);

        assert_eq!(seen[0].0, TaskStatus::Downloading);
        assert_eq!(seen[4].0, TaskStatus::Processing);
        assert_eq!(seen[5].0, TaskStatus::Processing);

        let done = registry.get(&task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Success);
        assert_eq!(done.eta, Some(0));
        assert!(done.speed.is_none());
    }

    #[tokio::test]
    async fn progress_counts_as_heartbeat() {
        let f = fixture(MockEngine::succeeding("x").with_events(vec![downloading(1, Some(2))]));
        let task = f.registry.create("u", MediaFormat::Audio, None);
        let before = f.activity.last_heartbeat();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        f.orchestrator.run(&task.id).await;

        assert!(f.activity.last_heartbeat() > before);
    }

    #[tokio::test]
    async fn unknown_task_is_a_no_op() {
        let f = fixture(MockEngine::succeeding("x"));
        f.orchestrator.run("nope").await;
        assert!(f.engine.recorded_requests().is_empty());
        assert!(f.registry.is_empty());
    }

    #[tokio::test]
    async fn unwritable_download_dir_fails_the_task() {
        let f = fixture(MockEngine::succeeding("x"));
        std::fs::write(&f.base, b"not a dir").unwrap();
        let task = f.registry.create("u", MediaFormat::Audio, None);

        f.orchestrator.run(&task.id).await;

        let done = f.registry.get(&task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Error);
        assert!(done.error.is_some());
        assert!(f.engine.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn concurrent_downloads_finish_independently() {
        let f = fixture(
            MockEngine::succeeding("ok")
                .with_delay(std::time::Duration::from_millis(50))
                .fail_urls(["https://bad.example"]),
        );
        let good = f.registry.create("https://good.example", MediaFormat::Audio, None);
        let bad = f.registry.create("https://bad.example", MediaFormat::Video, None);
        assert_ne!(good.id, bad.id);

        let a = f.orchestrator.spawn(good.id.clone());
        let b = f.orchestrator.spawn(bad.id.clone());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(f.activity.active_downloads(), 2);

        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(f.registry.get(&good.id).unwrap().status, TaskStatus::Success);
        assert_eq!(f.registry.get(&bad.id).unwrap().status, TaskStatus::Error);
        assert_eq!(f.activity.active_downloads(), 0);
    }
}
