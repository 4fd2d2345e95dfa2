use std::fmt;

use serde::{Deserialize, Serialize};

/// A pipeline whose logs are migrated.
///
/// Only the repository coordinates are read from the source API; everything else in
/// the record is ignored. The full repository path is the pipeline's identity for
/// checkpointing and is used as the path of its copy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    /// Repository host (e.g., "github.com")
    pub repo_source: String,
    /// Repository owner or group
    pub repo_owner: String,
    /// Repository name
    pub repo_name: String,
}

impl Pipeline {
    #[cfg(test)]
    pub fn new(
        repo_source: impl Into<String>,
        repo_owner: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        Self {
            repo_source: repo_source.into(),
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
        }
    }

    /// Full repository path, e.g. `github.com/group/repo`.
    pub fn full_repo_path(&self) -> String {
        format!("{}/{}/{}", self.repo_source, self.repo_owner, self.repo_name)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_repo_path())
    }
}

/// Independently paginated log stream of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    Builds,
    Releases,
}

impl LogCategory {
    /// Categories in migration order; releases start only after builds finish.
    pub const ALL: [LogCategory; 2] = [LogCategory::Builds, LogCategory::Releases];

    /// Value of the `filter[search]` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builds => "builds",
            Self::Releases => "releases",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page-copy request within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub category: LogCategory,
    pub page_number: usize,
    pub page_size: usize,
}

/// A page with fewer items than the page size marks the end of a category.
pub fn is_last_page(items_copied: usize, page_size: usize) -> bool {
    items_copied < page_size
}

/// Outcome of a successfully migrated pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedPipeline {
    pub pipeline: String,
    pub builds_copied: usize,
    pub releases_copied: usize,
}

/// Totals for one run of the migrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pipelines returned by the source API
    pub pipelines_listed: usize,
    /// Pipelines skipped because the checkpoint already lists them
    pub pipelines_skipped: usize,
    /// Pipelines migrated during this run
    pub pipelines_migrated: usize,
    pub builds_copied: usize,
    pub releases_copied: usize,
}

impl RunSummary {
    pub fn record(&mut self, migrated: &MigratedPipeline) {
        self.pipelines_migrated += 1;
        self.builds_copied += migrated.builds_copied;
        self.releases_copied += migrated.releases_copied;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_repo_path() {
        let pipeline = Pipeline::new("github.com", "estafette", "log-migrator");
        assert_eq!(pipeline.full_repo_path(), "github.com/estafette/log-migrator");
        assert_eq!(pipeline.to_string(), "github.com/estafette/log-migrator");
    }

    #[test]
    fn test_pipeline_deserializes_ignoring_extra_fields() {
        let json = r#"{
            "id": "123",
            "repoSource": "bitbucket.org",
            "repoOwner": "team",
            "repoName": "service",
            "repoBranch": "main"
        }"#;

        let pipeline: Pipeline = serde_json::from_str(json).unwrap();
        assert_eq!(pipeline.full_repo_path(), "bitbucket.org/team/service");
    }

    #[test]
    fn test_is_last_page() {
        assert!(is_last_page(0, 5));
        assert!(is_last_page(4, 5));
        assert!(!is_last_page(5, 5));
    }

    #[test]
    fn test_category_order_and_names() {
        assert_eq!(LogCategory::ALL, [LogCategory::Builds, LogCategory::Releases]);
        assert_eq!(LogCategory::Builds.as_str(), "builds");
        assert_eq!(LogCategory::Releases.to_string(), "releases");
    }
}
