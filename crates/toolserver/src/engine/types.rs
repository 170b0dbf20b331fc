//! Types exchanged with the media engine.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::task::MediaFormat;

/// What to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub format: MediaFormat,
    /// Upper bound on video height; ignored for audio.
    pub height: Option<u32>,
    pub target_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub title: String,
}

/// Byte counters reported while a transfer is running.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferProgress {
    pub downloaded_bytes: Option<u64>,
    /// Exact size, or the engine's estimate when the exact size is unknown.
    pub total_bytes: Option<u64>,
    pub eta_secs: Option<u64>,
    pub speed_bytes_per_sec: Option<f64>,
}

impl TransferProgress {
    /// `floor(downloaded * 100 / total)` clamped to 100, when a total is known.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total_bytes.filter(|t| *t > 0)?;
        let downloaded = self.downloaded_bytes.unwrap_or(0);
        let pct = (u128::from(downloaded) * 100 / u128::from(total)).min(100);
        Some(pct as u8)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading(TransferProgress),
    /// Transfer done; post-processing (merge, transcode) follows.
    Finished,
}

/// One format entry from the engine's metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FormatInfo {
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub vcodec: Option<String>,
}

impl FormatInfo {
    fn has_video(&self) -> bool {
        matches!(self.vcodec.as_deref(), Some(codec) if codec != "none")
    }
}

/// Metadata returned by an info query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default, rename = "duration_string")]
    pub duration: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoQuality {
    pub height: u32,
    pub label: String,
}

impl MediaInfo {
    /// Distinct heights offered by formats that carry video, lowest first.
    pub fn video_qualities(&self) -> Vec<VideoQuality> {
        let heights: BTreeSet<u32> = self
            .formats
            .iter()
            .filter(|f| f.has_video())
            .filter_map(|f| f.height.filter(|h| *h > 0))
            .collect();

        heights
            .into_iter()
            .map(|height| VideoQuality {
                height,
                label: format!("{height}p"),
            })
            .collect()
    }
}
