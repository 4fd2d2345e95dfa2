use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use super::{Checkpoint, CheckpointStore};
use crate::error::Result;

/// Checkpoint kept in a local YAML file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CheckpointStore for FileStore {
    async fn load(&self) -> Result<Checkpoint> {
        if !self.path.exists() {
            debug!(
                "No checkpoint at {}, starting from scratch",
                self.path.display()
            );
            return Ok(Checkpoint::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let checkpoint = Checkpoint::from_yaml(&content)?;

        info!(
            "Loaded {} finished pipelines from {}",
            checkpoint.len(),
            self.path.display()
        );

        Ok(checkpoint)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write next to the target and rename so readers never see a partial file.
        let temp = self.temp_path();
        fs::write(&temp, checkpoint.to_yaml()?)?;
        fs::rename(&temp, &self.path)?;

        debug!(
            "Saved {} finished pipelines to {}",
            checkpoint.len(),
            self.path.display()
        );

        Ok(())
    }
}
