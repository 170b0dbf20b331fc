//! Mock media engine.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::engine::{
    DownloadOutcome, DownloadRequest, EngineError, MediaEngine, MediaInfo, ProgressEvent,
    ProgressSink,
};

/// Scripted engine: replays progress events, optionally sleeps, then
/// succeeds or fails.
///
/// - Records every download request for assertions
/// - Fails downloads for selected URLs
/// - Returns canned metadata (or an error) for info queries
#[derive(Debug)]
pub struct MockEngine {
    title: String,
    failure: Option<String>,
    failing_urls: HashSet<String>,
    events: Vec<ProgressEvent>,
    delay: Duration,
    info: Result<MediaInfo, String>,
    requests: Mutex<Vec<DownloadRequest>>,
}

impl MockEngine {
    /// Every download succeeds with `title`.
    pub fn succeeding(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            failure: None,
            failing_urls: HashSet::new(),
            events: Vec::new(),
            delay: Duration::ZERO,
            info: Ok(MediaInfo::default()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every download fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::succeeding("")
        }
    }

    /// Events replayed into the sink before the outcome.
    pub fn with_events(mut self, events: Vec<ProgressEvent>) -> Self {
        self.events = events;
        self
    }

    /// Simulated transfer time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Downloads of these URLs fail.
    pub fn fail_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn with_info(mut self, info: MediaInfo) -> Self {
        self.info = Ok(info);
        self
    }

    pub fn with_info_error(mut self, message: impl Into<String>) -> Self {
        self.info = Err(message.into());
        self
    }

    fn requests(&self) -> MutexGuard<'_, Vec<DownloadRequest>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Download requests received so far.
    pub fn recorded_requests(&self) -> Vec<DownloadRequest> {
        self.requests().clone()
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_info(&self, _url: &str) -> Result<MediaInfo, EngineError> {
        self.info.clone().map_err(EngineError::failed)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome, EngineError> {
        self.requests().push(request.clone());

        for event in &self.events {
            sink.on_progress(event.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing_urls.contains(&request.url) {
            return Err(EngineError::failed(format!("ERROR: unable to download {}", request.url)));
        }
        match &self.failure {
            Some(message) => Err(EngineError::failed(message.clone())),
            None => Ok(DownloadOutcome {
                title: self.title.clone(),
            }),
        }
    }
}
