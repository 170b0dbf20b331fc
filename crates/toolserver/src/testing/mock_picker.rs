//! Mock folder picker.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::picker::{FolderPicker, PickerError};

/// Returns a fixed answer instead of opening a dialog.
#[derive(Debug, Clone)]
pub enum MockFolderPicker {
    Selecting(PathBuf),
    Cancelled,
    Broken(String),
}

impl MockFolderPicker {
    pub fn selecting(path: impl Into<PathBuf>) -> Self {
        Self::Selecting(path.into())
    }
}

#[async_trait]
impl FolderPicker for MockFolderPicker {
    async fn pick_folder(&self) -> Result<Option<PathBuf>, PickerError> {
        match self {
            Self::Selecting(path) => Ok(Some(path.clone())),
            Self::Cancelled => Ok(None),
            Self::Broken(reason) => Err(PickerError::failed(reason.clone())),
        }
    }
}
