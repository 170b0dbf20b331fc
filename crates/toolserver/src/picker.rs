//! Native folder selection dialog.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PickerError {
    #[error("{reason}")]
    Failed { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PickerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Asks the user for a directory. `Ok(None)` means the dialog was dismissed.
#[async_trait]
pub trait FolderPicker: Send + Sync {
    async fn pick_folder(&self) -> Result<Option<PathBuf>, PickerError>;
}

const PROMPT: &str = "Select Download Folder";

/// Shells out to the platform's dialog tool: `osascript` on macOS,
/// PowerShell on Windows, `zenity` or `kdialog` elsewhere.
#[derive(Debug, Default, Clone)]
pub struct NativeFolderPicker;

impl NativeFolderPicker {
    fn candidates() -> Vec<(&'static str, Vec<String>)> {
        if cfg!(target_os = "macos") {
            vec![(
                "osascript",
                vec![
                    "-e".to_string(),
                    format!("POSIX path of (choose folder with prompt \"{PROMPT}\")"),
                ],
            )]
        } else if cfg!(windows) {
            vec![(
                "powershell",
                vec![
                    "-NoProfile".to_string(),
                    "-Command".to_string(),
                    format!(
                        "(new-object -COM 'Shell.Application').BrowseForFolder(0,'{PROMPT}',0,0).self.path"
                    ),
                ],
            )]
        } else {
            vec![
                (
                    "zenity",
                    vec![
                        "--file-selection".to_string(),
                        "--directory".to_string(),
                        format!("--title={PROMPT}"),
                    ],
                ),
                (
                    "kdialog",
                    vec![
                        "--getexistingdirectory".to_string(),
                        ".".to_string(),
                        "--title".to_string(),
                        PROMPT.to_string(),
                    ],
                ),
            ]
        }
    }
}

#[async_trait]
impl FolderPicker for NativeFolderPicker {
    async fn pick_folder(&self) -> Result<Option<PathBuf>, PickerError> {
        let mut last_error = None;

        for (program, args) in Self::candidates() {
            let output = match Command::new(program).args(&args).output().await {
                Ok(output) => output,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(program, "folder picker not installed");
                    last_error = Some(PickerError::failed(format!("{program} is not available")));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            // non-zero exit is how every one of these tools reports "cancelled"
            if !output.status.success() {
                return Ok(None);
            }
            return Ok(selected_path(&String::from_utf8_lossy(&output.stdout)));
        }

        Err(last_error.unwrap_or_else(|| PickerError::failed("no folder picker available")))
    }
}

fn selected_path(stdout: &str) -> Option<PathBuf> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}
