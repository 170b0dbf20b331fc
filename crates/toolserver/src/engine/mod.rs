//! Adapter around the external media extraction engine (yt-dlp + ffmpeg).

mod error;
pub mod ffmpeg;
mod traits;
mod types;
mod ytdlp;

pub use error::EngineError;
pub use traits::{MediaEngine, ProgressSink};
pub use types::{
    DownloadOutcome, DownloadRequest, FormatInfo, MediaInfo, ProgressEvent, TransferProgress,
    VideoQuality,
};
pub use ytdlp::{YtDlpConfig, YtDlpEngine};
