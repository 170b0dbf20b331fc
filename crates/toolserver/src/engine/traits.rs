//! Trait definitions for the engine module.

use async_trait::async_trait;

use super::error::EngineError;
use super::types::{DownloadOutcome, DownloadRequest, MediaInfo, ProgressEvent};

/// Receives progress from a running download.
///
/// Called synchronously from the engine's output loop, so implementations
/// must be quick and must not block.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// External media extraction/transcoding engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Queries metadata without downloading anything.
    async fn fetch_info(&self, url: &str) -> Result<MediaInfo, EngineError>;

    /// Downloads and post-processes `request`, reporting progress to `sink`.
    async fn download(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome, EngineError>;
}
