//! Local HTTP toolserver that queues media downloads through yt-dlp, tracks
//! their progress in memory and shuts itself down once its UI goes away.

pub mod activity;
pub mod api;
pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod picker;
pub mod registry;
pub mod state;
pub mod task;
pub mod testing;

pub use activity::{ActivityMonitor, DownloadGuard, Verdict};
pub use config::{ConfigError, ConfigStore, ServerConfig, UserConfig};
pub use engine::{EngineError, MediaEngine, ProgressEvent, ProgressSink, YtDlpConfig, YtDlpEngine};
pub use orchestrator::Orchestrator;
pub use picker::{FolderPicker, NativeFolderPicker, PickerError};
pub use registry::{RegistryError, TaskRegistry};
pub use state::AppState;
pub use task::{MediaFormat, Task, TaskStatus, TaskUpdate};
