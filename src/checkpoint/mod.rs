mod configmap;
mod file;

pub use configmap::ConfigMapStore;
pub use file::FileStore;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Pipelines whose logs have been fully migrated.
///
/// Persisted as a YAML mapping with a single `finishedPipelines` sequence. The set
/// only grows: identifiers are appended in completion order and never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    finished_pipelines: IndexSet<String>,
}

impl Checkpoint {
    pub fn contains(&self, pipeline: &str) -> bool {
        self.finished_pipelines.contains(pipeline)
    }

    /// Marks a pipeline as finished. Returns `false` if it already was.
    pub fn record(&mut self, pipeline: impl Into<String>) -> bool {
        self.finished_pipelines.insert(pipeline.into())
    }

    pub fn len(&self) -> usize {
        self.finished_pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finished_pipelines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.finished_pipelines.iter().map(String::as_str)
    }

    /// Parses a checkpoint document; blank input is an empty checkpoint.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Persistence backend for the migration checkpoint.
pub trait CheckpointStore {
    /// Loads the persisted checkpoint, or an empty one when nothing was saved yet.
    async fn load(&self) -> Result<Checkpoint>;

    /// Replaces the persisted checkpoint.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::error::MigratorError;

    /// In-memory store recording every saved checkpoint.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub initial: Checkpoint,
        pub saves: Mutex<Vec<Checkpoint>>,
        pub fail_saves: bool,
        pub fail_loads: bool,
    }

    impl MemoryStore {
        pub(crate) fn with_finished(pipelines: &[&str]) -> Self {
            let mut initial = Checkpoint::default();
            for pipeline in pipelines {
                initial.record(*pipeline);
            }
            Self {
                initial,
                ..Self::default()
            }
        }

        pub(crate) fn saves(&self) -> Vec<Checkpoint> {
            self.saves.lock().unwrap().clone()
        }
    }

    impl CheckpointStore for MemoryStore {
        async fn load(&self) -> Result<Checkpoint> {
            if self.fail_loads {
                return Err(MigratorError::Checkpoint("store unavailable".into()));
            }
            Ok(self
                .saves
                .lock()
                .unwrap()
                .last()
                .cloned()
                .unwrap_or_else(|| self.initial.clone()))
        }

        async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
            if self.fail_saves {
                return Err(MigratorError::Checkpoint("store unavailable".into()));
            }
            self.saves.lock().unwrap().push(checkpoint.clone());
            Ok(())
        }
    }

    #[test]
    fn test_record_is_idempotent_and_ordered() {
        let mut checkpoint = Checkpoint::default();
        assert!(checkpoint.record("github.com/a/one"));
        assert!(checkpoint.record("github.com/a/two"));
        assert!(!checkpoint.record("github.com/a/one"));

        assert_eq!(checkpoint.len(), 2);
        assert!(checkpoint.contains("github.com/a/two"));
        assert!(!checkpoint.contains("github.com/a/three"));
        assert_eq!(
            checkpoint.iter().collect::<Vec<_>>(),
            vec!["github.com/a/one", "github.com/a/two"]
        );
    }

    #[test]
    fn test_yaml_document_format() {
        let mut checkpoint = Checkpoint::default();
        checkpoint.record("github.com/a/one");

        let yaml = checkpoint.to_yaml().unwrap();
        assert!(yaml.contains("finishedPipelines:"));
        assert!(yaml.contains("github.com/a/one"));

        let parsed = Checkpoint::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, checkpoint);
    }

    #[test]
    fn test_from_yaml_tolerates_empty_documents() {
        assert!(Checkpoint::from_yaml("").unwrap().is_empty());
        assert!(Checkpoint::from_yaml("   \n").unwrap().is_empty());
        assert!(Checkpoint::from_yaml("{}").unwrap().is_empty());
    }

    #[test]
    fn test_from_yaml_collapses_duplicates() {
        let checkpoint =
            Checkpoint::from_yaml("finishedPipelines:\n- github.com/a/one\n- github.com/a/one\n")
                .unwrap();
        assert_eq!(checkpoint.len(), 1);
    }

    #[test]
    fn test_from_yaml_rejects_malformed_documents() {
        assert!(Checkpoint::from_yaml("finishedPipelines: [unterminated").is_err());
    }
}
