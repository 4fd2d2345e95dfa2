use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::MigratorError;

/// Configuration file structure for the log migrator.
///
/// Every value can also be given as a command line flag or environment variable,
/// which take precedence over the file. Configuration files are loaded from the
/// current directory or a specified path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    #[serde(default)]
    pub api: ApiSection,

    #[serde(default)]
    pub migration: MigrationSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub checkpoint: CheckpointSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiSection {
    /// Base URL of the source API
    pub url: Option<String>,

    /// Bearer token sent with every request
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MigrationSection {
    #[serde(default = "default_pipelines_page_size")]
    pub page_size_for_pipelines_retrieval: usize,

    #[serde(default = "default_logs_page_size")]
    pub page_size_for_migration: usize,

    #[serde(default = "default_pages_in_parallel")]
    pub pages_to_migrate_in_parallel: usize,

    #[serde(default = "default_pipelines_in_parallel")]
    pub pipelines_to_migrate_in_parallel: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CheckpointSection {
    #[serde(default)]
    pub backend: CheckpointBackendKind,

    /// Checkpoint file used by the `file` backend
    #[serde(default = "default_checkpoint_path")]
    pub path: PathBuf,

    /// ConfigMap used by the `configmap` backend
    #[serde(default = "default_configmap_name")]
    pub configmap_name: String,

    /// Key inside the ConfigMap data holding the checkpoint document
    #[serde(default = "default_configmap_key")]
    pub configmap_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackendKind {
    #[default]
    File,
    Configmap,
}

impl Default for MigrationSection {
    fn default() -> Self {
        Self {
            page_size_for_pipelines_retrieval: default_pipelines_page_size(),
            page_size_for_migration: default_logs_page_size(),
            pages_to_migrate_in_parallel: default_pages_in_parallel(),
            pipelines_to_migrate_in_parallel: default_pipelines_in_parallel(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CheckpointSection {
    fn default() -> Self {
        Self {
            backend: CheckpointBackendKind::default(),
            path: default_checkpoint_path(),
            configmap_name: default_configmap_name(),
            configmap_key: default_configmap_key(),
        }
    }
}

fn default_pipelines_page_size() -> usize {
    10
}

fn default_logs_page_size() -> usize {
    5
}

fn default_pages_in_parallel() -> usize {
    2
}

fn default_pipelines_in_parallel() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("checkpoint.yaml")
}

fn default_configmap_name() -> String {
    "estafette-ci-log-migrator".to_string()
}

fn default_configmap_key() -> String {
    "config.yaml".to_string()
}

impl ConfigFile {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./log-migrator.toml
    /// 3. ./log-migrator.json
    /// 4. ./log-migrator.yaml
    /// 5. ./log-migrator.yml
    ///
    /// Returns default configuration if no candidate file is found. An explicitly
    /// given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "log-migrator.toml",
            "log-migrator.json",
            "log-migrator.yaml",
            "log-migrator.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Validates the merged settings into the immutable run configuration.
    pub fn into_config(self) -> crate::error::Result<MigratorConfig> {
        let url = self
            .api
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| MigratorError::Config("API URL is required".into()))?;

        let api_url = Url::parse(&url)
            .map_err(|e| MigratorError::Config(format!("Invalid API URL '{url}': {e}")))?;

        let api_key = self
            .api
            .key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| MigratorError::Config("API key is required".into()))?;

        let migration = self.migration;
        for (name, value) in [
            (
                "page size for pipelines retrieval",
                migration.page_size_for_pipelines_retrieval,
            ),
            ("page size for migration", migration.page_size_for_migration),
            (
                "pages to migrate in parallel",
                migration.pages_to_migrate_in_parallel,
            ),
            (
                "pipelines to migrate in parallel",
                migration.pipelines_to_migrate_in_parallel,
            ),
        ] {
            if value == 0 {
                return Err(MigratorError::Config(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(MigratorError::Config(
                "max attempts must be greater than zero".into(),
            ));
        }

        if self.retry.request_timeout_secs == 0 {
            return Err(MigratorError::Config(
                "request timeout must be greater than zero".into(),
            ));
        }

        let checkpoint = match self.checkpoint.backend {
            CheckpointBackendKind::File => CheckpointBackend::File {
                path: self.checkpoint.path,
            },
            CheckpointBackendKind::Configmap => CheckpointBackend::ConfigMap {
                name: self.checkpoint.configmap_name,
                key: self.checkpoint.configmap_key,
            },
        };

        Ok(MigratorConfig {
            api_url,
            api_key,
            pipelines_page_size: migration.page_size_for_pipelines_retrieval,
            logs_page_size: migration.page_size_for_migration,
            pages_in_parallel: migration.pages_to_migrate_in_parallel,
            pipelines_in_parallel: migration.pipelines_to_migrate_in_parallel,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                request_timeout: Duration::from_secs(self.retry.request_timeout_secs),
            },
            checkpoint,
        })
    }
}

/// Retry policy applied to every request made against the source API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every following retry
    pub base_delay: Duration,
    /// Timeout of a single attempt; also caps the backoff delay
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: Duration::from_millis(default_base_delay_ms()),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointBackend {
    File { path: PathBuf },
    ConfigMap { name: String, key: String },
}

/// Immutable configuration of a migration run, built once at startup.
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    pub api_url: Url,
    pub api_key: String,
    pub pipelines_page_size: usize,
    pub logs_page_size: usize,
    pub pages_in_parallel: usize,
    pub pipelines_in_parallel: usize,
    pub retry: RetryPolicy,
    pub checkpoint: CheckpointBackend,
}

impl MigratorConfig {
    /// Pages copied concurrently within one category.
    ///
    /// Only one concurrency axis runs in parallel: when several pipelines are
    /// migrated at once, their pages are copied one at a time.
    pub fn effective_pages_in_parallel(&self) -> usize {
        if self.pipelines_in_parallel > 1 {
            1
        } else {
            self.pages_in_parallel
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with_api() -> ConfigFile {
        ConfigFile {
            api: ApiSection {
                url: Some("https://ci.example.com".to_string()),
                key: Some("secret".to_string()),
            },
            ..ConfigFile::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.migration.page_size_for_pipelines_retrieval, 10);
        assert_eq!(config.migration.page_size_for_migration, 5);
        assert_eq!(config.migration.pages_to_migrate_in_parallel, 2);
        assert_eq!(config.migration.pipelines_to_migrate_in_parallel, 1);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.checkpoint.backend, CheckpointBackendKind::File);
        assert_eq!(config.checkpoint.configmap_name, "estafette-ci-log-migrator");
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[api]
url = "https://ci.example.com"
key = "toml-key"

[migration]
page-size-for-migration = 20
pages-to-migrate-in-parallel = 4

[checkpoint]
backend = "configmap"
configmap-name = "my-migrator"
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = ConfigFile::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.api.key, Some("toml-key".to_string()));
        assert_eq!(config.migration.page_size_for_migration, 20);
        assert_eq!(config.migration.pages_to_migrate_in_parallel, 4);
        assert_eq!(config.migration.page_size_for_pipelines_retrieval, 10);
        assert_eq!(config.checkpoint.backend, CheckpointBackendKind::Configmap);
        assert_eq!(config.checkpoint.configmap_name, "my-migrator");
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        let yaml_content = r#"
api:
  url: https://ci.example.com
retry:
  max-attempts: 3
  base-delay-ms: 10
"#;
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = ConfigFile::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.api.url, Some("https://ci.example.com".to_string()));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 10);
        assert_eq!(config.retry.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let err = ConfigFile::load(Some(Path::new("/definitely/missing/settings.toml")))
            .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }

    #[test]
    fn test_into_config() {
        let config = file_with_api().into_config().unwrap();
        assert_eq!(config.api_url.as_str(), "https://ci.example.com/");
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.logs_page_size, 5);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(
            config.checkpoint,
            CheckpointBackend::File {
                path: PathBuf::from("checkpoint.yaml")
            }
        );
    }

    #[test]
    fn test_into_config_requires_api_settings() {
        let err = ConfigFile::default().into_config().unwrap_err();
        assert!(err.to_string().contains("API URL is required"));

        let mut file = file_with_api();
        file.api.key = None;
        let err = file.into_config().unwrap_err();
        assert!(err.to_string().contains("API key is required"));

        let mut file = file_with_api();
        file.api.url = Some("not a url".to_string());
        assert!(file.into_config().is_err());
    }

    #[test]
    fn test_into_config_rejects_zero_values() {
        let mut file = file_with_api();
        file.migration.page_size_for_migration = 0;
        let err = file.into_config().unwrap_err();
        assert!(err.to_string().contains("page size for migration"));

        let mut file = file_with_api();
        file.migration.pages_to_migrate_in_parallel = 0;
        assert!(file.into_config().is_err());

        let mut file = file_with_api();
        file.retry.max_attempts = 0;
        assert!(file.into_config().is_err());

        let mut file = file_with_api();
        file.retry.request_timeout_secs = 0;
        let err = file.into_config().unwrap_err();
        assert!(err.to_string().contains("request timeout"));
    }

    #[test]
    fn test_effective_pages_in_parallel() {
        let mut file = file_with_api();
        file.migration.pages_to_migrate_in_parallel = 4;
        let config = file.clone().into_config().unwrap();
        assert_eq!(config.effective_pages_in_parallel(), 4);

        file.migration.pipelines_to_migrate_in_parallel = 3;
        let config = file.into_config().unwrap();
        assert_eq!(config.effective_pages_in_parallel(), 1);
    }
}
