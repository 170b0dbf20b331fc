//! Mock collaborators for tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use ytmedia_toolserver::testing::{MockEngine, MockFolderPicker};
//!
//! let engine = MockEngine::succeeding("Some title")
//!     .with_delay(Duration::from_millis(20))
//!     .fail_urls(["https://broken.example"]);
//! let picker = MockFolderPicker::selecting("/tmp/out");
//! ```

mod mock_engine;
mod mock_picker;

pub use mock_engine::MockEngine;
pub use mock_picker::MockFolderPicker;
