use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use crate::checkpoint::{CheckpointStore, ConfigMapStore, FileStore};
use crate::client::ApiClient;
use crate::config::{CheckpointBackend, CheckpointBackendKind, ConfigFile, MigratorConfig};
use crate::migrator::{MigrationSettings, Migrator};
use crate::types::RunSummary;

#[derive(Parser, Debug, Default)]
#[command(name = "log-migrator")]
#[command(author, version, about = "Migrates CI build and release logs to cloud storage", long_about = None)]
pub struct Cli {
    /// The location of the CI API to communicate with
    #[arg(long, env = "API_URL")]
    api_url: Option<String>,

    /// Bearer token for the CI API
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Page size for retrieving pipelines from the API [default: 10]
    #[arg(long, env = "PAGE_SIZE_FOR_PIPELINES_RETRIEVAL")]
    page_size_for_pipelines_retrieval: Option<usize>,

    /// Page size for migrating logs to cloud storage via the API [default: 5]
    #[arg(long, env = "PAGE_SIZE_FOR_MIGRATION")]
    page_size_for_migration: Option<usize>,

    /// Number of pages to migrate in parallel via the API [default: 2]
    #[arg(long, env = "PAGES_TO_MIGRATE_IN_PARALLEL")]
    pages_to_migrate_in_parallel: Option<usize>,

    /// Number of pipelines to migrate in parallel [default: 1]
    #[arg(long, env = "PIPELINES_TO_MIGRATE_IN_PARALLEL")]
    pipelines_to_migrate_in_parallel: Option<usize>,

    /// Maximum attempts per API request [default: 5]
    #[arg(long, env = "MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Where finished pipelines are recorded [default: file]
    #[arg(long, value_enum, env = "CHECKPOINT_BACKEND")]
    checkpoint_backend: Option<CheckpointBackendKind>,

    /// Path of the checkpoint file for the file backend
    #[arg(long, env = "CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Name of the configmap to record finished pipelines in
    #[arg(long, env = "CONFIGMAP_NAME")]
    configmap_name: Option<String>,

    /// Settings file (TOML, JSON or YAML); flags and environment take precedence
    #[arg(short, long, env = "LOG_MIGRATOR_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, file: &mut ConfigFile) {
        if let Some(url) = &self.api_url {
            file.api.url = Some(url.clone());
        }
        if let Some(key) = &self.api_key {
            file.api.key = Some(key.clone());
        }

        let migration = &mut file.migration;
        if let Some(size) = self.page_size_for_pipelines_retrieval {
            migration.page_size_for_pipelines_retrieval = size;
        }
        if let Some(size) = self.page_size_for_migration {
            migration.page_size_for_migration = size;
        }
        if let Some(pages) = self.pages_to_migrate_in_parallel {
            migration.pages_to_migrate_in_parallel = pages;
        }
        if let Some(pipelines) = self.pipelines_to_migrate_in_parallel {
            migration.pipelines_to_migrate_in_parallel = pipelines;
        }

        if let Some(attempts) = self.max_attempts {
            file.retry.max_attempts = attempts;
        }

        let checkpoint = &mut file.checkpoint;
        if let Some(backend) = self.checkpoint_backend {
            checkpoint.backend = backend;
        }
        if let Some(path) = &self.config_path {
            checkpoint.path = path.clone();
        }
        if let Some(name) = &self.configmap_name {
            checkpoint.configmap_name = name.clone();
        }
    }

    /// Merges the settings file with flags and environment and validates the result.
    pub fn resolve_config(&self) -> Result<MigratorConfig> {
        let mut file = ConfigFile::load(self.config.as_deref())?;
        self.apply_overrides(&mut file);
        file.into_config().context("Invalid migrator configuration")
    }

    pub async fn execute(&self) -> Result<RunSummary> {
        let config = self.resolve_config()?;

        info!(
            "Migrating logs from {} ({} logs per page, {} pages and {} pipelines in parallel)",
            config.api_url,
            config.logs_page_size,
            config.pages_in_parallel,
            config.pipelines_in_parallel
        );

        if config.pipelines_in_parallel > 1 && config.pages_in_parallel > 1 {
            warn!(
                "Migrating {} pipelines in parallel, pages of each pipeline are copied one at a time",
                config.pipelines_in_parallel
            );
        }

        let client = ApiClient::from_config(&config).context("Failed initializing api client")?;

        match &config.checkpoint {
            CheckpointBackend::File { path } => {
                info!("Recording finished pipelines in {}", path.display());
                let store = FileStore::new(path.clone());
                migrate(&config, &client, &store).await
            }
            CheckpointBackend::ConfigMap { name, key } => {
                let store = ConfigMapStore::in_cluster(name.clone(), key.clone())
                    .context("Failed creating Kubernetes API client")?;
                migrate(&config, &client, &store).await
            }
        }
    }
}

async fn migrate<S: CheckpointStore>(
    config: &MigratorConfig,
    client: &ApiClient,
    store: &S,
) -> Result<RunSummary> {
    let migrator = Migrator::new(client, store, MigrationSettings::from(config));
    Ok(migrator.run().await?)
}
