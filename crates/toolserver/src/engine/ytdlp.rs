//! yt-dlp subprocess engine.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::error::EngineError;
use super::traits::{MediaEngine, ProgressSink};
use super::types::{DownloadOutcome, DownloadRequest, MediaInfo, ProgressEvent, TransferProgress};
use crate::task::MediaFormat;

const PROGRESS_MARKER: &str = "ytmedia-progress:";
const TITLE_MARKER: &str = "ytmedia-title:";

/// Fields emitted per progress line, pipe separated, in this order.
const PROGRESS_TEMPLATE: &str = "download:ytmedia-progress:%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.eta)s|%(progress.speed)s";

const AUDIO_CODEC: &str = "mp3";
const AUDIO_QUALITY: &str = "192K";
const VIDEO_CONTAINER: &str = "mp4";
const VIDEO_TRANSCODE_ARGS: &str = "VideoConvertor:-c:v libx264 -preset fast -crf 23 -c:a aac";

#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// yt-dlp executable.
    pub binary: PathBuf,
    /// Passed as `--ffmpeg-location` when set.
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
        }
    }
}

pub struct YtDlpEngine {
    config: YtDlpConfig,
}

impl YtDlpEngine {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::NotFound {
                path: self.config.binary.clone(),
            }
        } else {
            EngineError::Io(e)
        }
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch_info(&self, url: &str) -> Result<MediaInfo, EngineError> {
        let args = build_info_args(url);
        let output = self
            .command(&args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let errors: Vec<String> = stderr.lines().map(str::to_string).collect();
            return Err(EngineError::failed(failure_message(&errors, &errors, output.status)));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::parse(format!("invalid info JSON: {e}")))
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome, EngineError> {
        let args = build_download_args(request, self.config.ffmpeg_location.as_ref());
        debug!(url = %request.url, format = %request.format, "starting yt-dlp");

        let mut child = self.command(&args).spawn().map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("Could not capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("Could not capture stderr"))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_line_reader(stdout, Stream::Stdout, tx.clone());
        spawn_line_reader(stderr, Stream::Stderr, tx);

        let mut title = None;
        let mut errors = Vec::new();
        let mut stderr_tail = Vec::new();

        while let Some((stream, line)) = rx.recv().await {
            match parse_line(&line) {
                Some(OutputLine::Progress(event)) => sink.on_progress(event),
                Some(OutputLine::Title(t)) => title = Some(t),
                Some(OutputLine::Error(message)) => errors.push(message),
                None => {
                    trace!(?stream, %line, "yt-dlp");
                    if stream == Stream::Stderr && !line.trim().is_empty() {
                        stderr_tail.push(line);
                    }
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(EngineError::failed(failure_message(&errors, &stderr_tail, status)));
        }

        Ok(DownloadOutcome {
            title: title.unwrap_or_else(|| "download".to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

fn spawn_line_reader<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        // keep draining until EOF; closing the pipe early kills yt-dlp with SIGPIPE
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(?stream, error = %e, "yt-dlp output read failed");
                    break;
                }
            }
        }
    });
}

/// Picks the most useful error text: `ERROR:` lines first, then the last
/// stderr line, then the exit status.
fn failure_message(errors: &[String], stderr: &[String], status: ExitStatus) -> String {
    let explicit: Vec<&str> = errors
        .iter()
        .map(String::as_str)
        .filter(|l| l.starts_with("ERROR:"))
        .collect();
    if !explicit.is_empty() {
        return explicit.join("\n");
    }
    stderr
        .iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}

#[derive(Debug, PartialEq)]
enum OutputLine {
    Progress(ProgressEvent),
    Title(String),
    Error(String),
}

fn parse_line(line: &str) -> Option<OutputLine> {
    let line = line.trim_end();

    if let Some(idx) = line.find(PROGRESS_MARKER) {
        return parse_progress(&line[idx + PROGRESS_MARKER.len()..]).map(OutputLine::Progress);
    }
    if let Some(title) = line.strip_prefix(TITLE_MARKER) {
        return Some(OutputLine::Title(title.to_string()));
    }
    if line.starts_with("ERROR:") {
        return Some(OutputLine::Error(line.to_string()));
    }
    None
}

fn parse_progress(fields: &str) -> Option<ProgressEvent> {
    let mut parts = fields.split('|');
    let status = parts.next()?;
    let mut number = || {
        parts
            .next()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
    };
    let downloaded = number();
    let total = number();
    let estimate = number();
    let eta = number();
    let speed = number();

    match status {
        "downloading" => Some(ProgressEvent::Downloading(TransferProgress {
            downloaded_bytes: downloaded.map(|v| v as u64),
            total_bytes: total.or(estimate).map(|v| v as u64),
            eta_secs: eta.map(|v| v as u64),
            speed_bytes_per_sec: speed,
        })),
        "finished" => Some(ProgressEvent::Finished),
        _ => None,
    }
}

fn common_args() -> Vec<String> {
    [
        "--no-playlist",
        "--no-check-certificates",
        "--no-warnings",
        "--encoding",
        "utf-8",
    ]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn build_info_args(url: &str) -> Vec<String> {
    let mut args = common_args();
    args.extend(["-J".to_string(), "--".to_string(), url.to_string()]);
    args
}

/// yt-dlp format selector for `format` and an optional height cap.
///
/// Video prefers H.264 (`avc1`) with m4a audio and falls back step by step to
/// anything that carries video.
pub fn format_selector(format: MediaFormat, height: Option<u32>) -> String {
    match format {
        MediaFormat::Audio => "bestaudio/best".to_string(),
        MediaFormat::Video => {
            let cap = height.map(|h| format!("[height<={h}]")).unwrap_or_default();
            [
                format!("bestvideo{cap}[vcodec^=avc1]+bestaudio[ext=m4a]"),
                format!("bestvideo{cap}[vcodec^=avc1]+bestaudio"),
                format!("best{cap}[vcodec^=avc1]"),
                format!("bestvideo{cap}+bestaudio"),
                format!("best{cap}[vcodec!=none]"),
            ]
            .join("/")
        }
    }
}

pub(crate) fn build_download_args(
    request: &DownloadRequest,
    ffmpeg_location: Option<&PathBuf>,
) -> Vec<String> {
    let mut args = common_args();

    args.extend([
        "--newline".to_string(),
        "--progress".to_string(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
        "--print".to_string(),
        format!("after_move:{TITLE_MARKER}%(title)s"),
        "--no-simulate".to_string(),
        "-P".to_string(),
        request.target_dir.to_string_lossy().to_string(),
        "-o".to_string(),
        "%(title)s.%(ext)s".to_string(),
    ]);

    if let Some(ffmpeg) = ffmpeg_location {
        args.extend([
            "--ffmpeg-location".to_string(),
            ffmpeg.to_string_lossy().to_string(),
        ]);
    }

    args.extend(["-f".to_string(), format_selector(request.format, request.height)]);

    match request.format {
        MediaFormat::Audio => args.extend([
            "-x".to_string(),
            "--audio-format".to_string(),
            AUDIO_CODEC.to_string(),
            "--audio-quality".to_string(),
            AUDIO_QUALITY.to_string(),
        ]),
        MediaFormat::Video => args.extend([
            "--merge-output-format".to_string(),
            VIDEO_CONTAINER.to_string(),
            "--recode-video".to_string(),
            VIDEO_CONTAINER.to_string(),
            "--postprocessor-args".to_string(),
            VIDEO_TRANSCODE_ARGS.to_string(),
        ]),
    }

    args.extend(["--".to_string(), request.url.clone()]);
    args
}
