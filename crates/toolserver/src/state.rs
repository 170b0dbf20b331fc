use std::sync::Arc;

use crate::activity::ActivityMonitor;
use crate::config::ConfigStore;
use crate::engine::MediaEngine;
use crate::orchestrator::Orchestrator;
use crate::picker::FolderPicker;
use crate::registry::TaskRegistry;

/// Shared handles passed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TaskRegistry>,
    pub activity: Arc<ActivityMonitor>,
    pub config: Arc<ConfigStore>,
    pub engine: Arc<dyn MediaEngine>,
    pub picker: Arc<dyn FolderPicker>,
    pub orchestrator: Orchestrator,
    pub ffmpeg: bool,
}

impl AppState {
    pub fn new(
        config: Arc<ConfigStore>,
        activity: Arc<ActivityMonitor>,
        engine: Arc<dyn MediaEngine>,
        picker: Arc<dyn FolderPicker>,
        ffmpeg: bool,
    ) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&activity),
            Arc::clone(&config),
            Arc::clone(&engine),
        );

        Self {
            registry,
            activity,
            config,
            engine,
            picker,
            orchestrator,
            ffmpeg,
        }
    }
}
