//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while talking to the external engine.
///
/// `Failed` carries the engine's own message verbatim; it is what ends up in
/// a task's `error` field.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary could not be started.
    #[error("yt-dlp not found at path: {}", .path.display())]
    NotFound { path: PathBuf },

    /// Engine ran and reported a failure.
    #[error("{message}")]
    Failed { message: String },

    /// Engine output was not what we expected.
    #[error("Failed to parse engine output: {reason}")]
    Parse { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }
}
