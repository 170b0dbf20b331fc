//! Download task record and its state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Output kind requested for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Audio,
    Video,
}

impl MediaFormat {
    /// Parses the wire value (`"audio"` or `"video"`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// Subdirectory of the configured download path that receives this kind.
    pub fn subdir(self) -> &'static str {
        match self {
            Self::Audio => "audios",
            Self::Video => "videos",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Lifecycle state of a task.
///
/// `pending -> downloading -> processing -> {success, error}`, with `error`
/// reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Downloading,
    Processing,
    Success,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// Whether a task in `self` may move to `next`.
    ///
    /// Re-entering the same non-terminal state is allowed so progress updates
    /// can carry their status along.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;

        if self.is_terminal() {
            return false;
        }
        if self == next || next == Error {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Downloading, Processing)
                | (Downloading, Success)
                | (Processing, Success)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted download job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub url: String,
    pub format: MediaFormat,
    pub height: Option<u32>,
    pub status: TaskStatus,
    pub percent: u8,
    pub message: String,
    pub eta: Option<u64>,
    pub speed: Option<String>,
    pub downloaded: Option<String>,
    pub total: Option<String>,
    pub title: Option<String>,
    pub error: Option<String>,
    pub target_dir: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub(crate) fn new(id: String, url: String, format: MediaFormat, height: Option<u32>) -> Self {
        let now = now_ms();
        Self {
            id,
            url,
            format,
            height,
            status: TaskStatus::Pending,
            percent: 0,
            message: "Queued...".to_string(),
            eta: None,
            speed: None,
            downloaded: None,
            total: None,
            title: None,
            error: None,
            target_dir: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `update` into this record. The caller has already validated
    /// the status transition.
    pub(crate) fn apply(&mut self, update: TaskUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(percent) = update.percent {
            // never goes backwards
            self.percent = self.percent.max(percent.min(100));
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(eta) = update.eta {
            self.eta = eta;
        }
        if let Some(speed) = update.speed {
            self.speed = speed;
        }
        if let Some(downloaded) = update.downloaded {
            self.downloaded = downloaded;
        }
        if let Some(total) = update.total {
            self.total = total;
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(error) = update.error {
            self.error = error;
        }
        if let Some(target_dir) = update.target_dir {
            self.target_dir = target_dir;
        }
        self.updated_at = now_ms().max(self.updated_at);
    }
}

/// Partial set of task fields to merge.
///
/// Nullable fields use `Option<Option<_>>`: the outer `None` leaves the field
/// alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub percent: Option<u8>,
    pub message: Option<String>,
    pub eta: Option<Option<u64>>,
    pub speed: Option<Option<String>>,
    pub downloaded: Option<Option<String>>,
    pub total: Option<Option<String>>,
    pub title: Option<Option<String>>,
    pub error: Option<Option<String>>,
    pub target_dir: Option<Option<String>>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn eta(mut self, eta: Option<u64>) -> Self {
        self.eta = Some(eta);
        self
    }

    pub fn speed(mut self, speed: Option<String>) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn downloaded(mut self, downloaded: Option<String>) -> Self {
        self.downloaded = Some(downloaded);
        self
    }

    pub fn total(mut self, total: Option<String>) -> Self {
        self.total = Some(total);
        self
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = Some(title);
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn target_dir(mut self, target_dir: Option<String>) -> Self {
        self.target_dir = Some(target_dir);
        self
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("id".into(), "https://example.com/v".into(), MediaFormat::Video, None)
    }

    #[test]
    fn new_task_is_queued() {
        let t = task();
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.percent, 0);
        assert_eq!(t.message, "Queued...");
        assert!(t.eta.is_none() && t.speed.is_none() && t.title.is_none());
        assert_eq!(t.created_at, t.updated_at);
    }

    #[test]
    fn transitions_follow_the_machine() {
        use TaskStatus::*;

        assert!(Pending.can_transition_to(Downloading));
        assert!(Downloading.can_transition_to(Downloading));
        assert!(Downloading.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Success));

        assert!(!Pending.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Success));
        assert!(!Processing.can_transition_to(Downloading));

        for status in [Pending, Downloading, Processing] {
            assert!(status.can_transition_to(Error), "{status} -> error");
        }
        for terminal in [Success, Error] {
            for next in [Pending, Downloading, Processing, Success, Error] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn percent_is_clamped_and_monotonic() {
        let mut t = task();
        t.apply(TaskUpdate::new().percent(40));
        assert_eq!(t.percent, 40);
        t.apply(TaskUpdate::new().percent(10));
        assert_eq!(t.percent, 40);
        t.apply(TaskUpdate::new().percent(250));
        assert_eq!(t.percent, 100);
    }

    #[test]
    fn nullable_fields_can_be_cleared() {
        let mut t = task();
        t.apply(TaskUpdate::new().speed(Some("1.0 MiB/s".into())).eta(Some(12)));
        assert_eq!(t.speed.as_deref(), Some("1.0 MiB/s"));

        t.apply(TaskUpdate::new().speed(None));
        assert!(t.speed.is_none());
        assert_eq!(t.eta, Some(12));
    }

    #[test]
    fn format_parsing() {
        assert_eq!(MediaFormat::parse("audio"), Some(MediaFormat::Audio));
        assert_eq!(MediaFormat::parse("video"), Some(MediaFormat::Video));
        assert_eq!(MediaFormat::parse("gif"), None);
        assert_eq!(MediaFormat::Audio.subdir(), "audios");
    }

    #[test]
    fn serializes_lowercase_wire_names() {
        let json = serde_json::to_value(task()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["format"], "video");
        assert!(json["height"].is_null());
    }
}
