use std::path::PathBuf;
use std::sync::Arc;

use dashsync::{Orchestrator, SyncCoordinator, TransformRunner};
use dashsync_connectors::builtin_registry;
use dashsync_store::{ConfigFiles, DataDirectory};

use crate::config::AppConfig;

/// Everything a command touches on disk, resolved from [`AppConfig`].
pub struct Workspace {
    pub data: DataDirectory,
    pub documents: ConfigFiles,
    pub transforms: TransformRunner,
    pub charts_dir: PathBuf,
}

impl Workspace {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut transforms =
            TransformRunner::new(config.handlers_path()).with_timeout(config.transform_timeout());
        if let Some(interpreter) = &config.transform_interpreter {
            transforms = transforms.with_interpreter(interpreter.clone());
        }

        Self {
            data: DataDirectory::new(config.data_path()),
            documents: ConfigFiles::new(config.config_path()),
            transforms,
            charts_dir: config.charts_path(),
        }
    }

    pub fn coordinator(&self) -> SyncCoordinator {
        let orchestrator = Orchestrator::new(
            builtin_registry().discover(),
            self.transforms.clone(),
            Arc::new(self.data.clone()),
        );
        SyncCoordinator::new(orchestrator)
    }
}
