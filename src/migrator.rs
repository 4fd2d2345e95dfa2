use std::collections::HashSet;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info};

use crate::checkpoint::CheckpointStore;
use crate::client::MigrationSource;
use crate::config::MigratorConfig;
use crate::error::{MigratorError, Result};
use crate::output::MigrationProgress;
use crate::types::{is_last_page, LogCategory, MigratedPipeline, PageRequest, Pipeline, RunSummary};

/// Concurrency and paging settings of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationSettings {
    /// Log items requested per page
    pub page_size: usize,
    /// Pages copied concurrently within one category
    pub pages_in_parallel: usize,
    /// Pipelines migrated concurrently
    pub pipelines_in_parallel: usize,
}

impl From<&MigratorConfig> for MigrationSettings {
    fn from(config: &MigratorConfig) -> Self {
        Self {
            page_size: config.logs_page_size,
            pages_in_parallel: config.effective_pages_in_parallel(),
            pipelines_in_parallel: config.pipelines_in_parallel,
        }
    }
}

/// Drives the migration of every unfinished pipeline.
///
/// Work is issued in fixed-size batches: a batch is forked, joined and inspected
/// before the next one starts, both for pages within a category and for groups of
/// pipelines. The migrator is the only writer of the checkpoint.
pub struct Migrator<'a, A, S> {
    api: &'a A,
    store: &'a S,
    settings: MigrationSettings,
}

impl<'a, A, S> Migrator<'a, A, S>
where
    A: MigrationSource,
    S: CheckpointStore,
{
    pub fn new(api: &'a A, store: &'a S, settings: MigrationSettings) -> Self {
        Self {
            api,
            store,
            settings: MigrationSettings {
                page_size: settings.page_size.max(1),
                pages_in_parallel: settings.pages_in_parallel.max(1),
                pipelines_in_parallel: settings.pipelines_in_parallel.max(1),
            },
        }
    }

    /// Migrates all pipelines not yet listed in the checkpoint.
    ///
    /// The checkpoint is saved right after each pipeline succeeds. When a pipeline
    /// fails, the other members of its group are allowed to finish (and are
    /// checkpointed if they succeed) but no further group is started.
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::PipelineFailed`] for the first failing pipeline,
    /// [`MigratorError::Checkpoint`] when the checkpoint cannot be loaded or saved,
    /// and any listing error unchanged.
    pub async fn run(&self) -> Result<RunSummary> {
        let progress = MigrationProgress::start_listing();

        let pipelines = match self.api.list_all_pipelines().await {
            Ok(pipelines) => pipelines,
            Err(e) => {
                progress.abandon();
                return Err(e);
            }
        };
        info!("Retrieved {} pipelines", pipelines.len());

        let mut checkpoint = match self.store.load().await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                progress.abandon();
                return Err(MigratorError::Checkpoint(format!(
                    "Failed loading checkpoint: {e}"
                )));
            }
        };

        if checkpoint.is_empty() {
            info!("No finished pipelines recorded yet");
        } else {
            debug!(
                "Finished pipelines: {}",
                checkpoint.iter().collect::<Vec<_>>().join(", ")
            );
        }

        let mut seen = HashSet::new();
        let pending: Vec<&Pipeline> = pipelines
            .iter()
            .filter(|pipeline| {
                let id = pipeline.full_repo_path();
                !checkpoint.contains(&id) && seen.insert(id)
            })
            .collect();

        let mut summary = RunSummary {
            pipelines_listed: pipelines.len(),
            pipelines_skipped: pipelines.len() - pending.len(),
            ..RunSummary::default()
        };

        info!(
            "Skipping {} already migrated pipelines, {} left to migrate",
            summary.pipelines_skipped,
            pending.len()
        );

        let progress = progress.finish_listing_start_migration(pending.len(), summary.pipelines_skipped);

        for group in pending.chunks(self.settings.pipelines_in_parallel) {
            let mut in_flight: FuturesUnordered<_> = group
                .iter()
                .map(|pipeline| async move { (*pipeline, self.migrate_pipeline(pipeline).await) })
                .collect();

            let mut failure = None;
            while let Some((pipeline, result)) = in_flight.next().await {
                match result {
                    Ok(migrated) => {
                        checkpoint.record(migrated.pipeline.clone());
                        if let Err(e) = self.store.save(&checkpoint).await {
                            progress.abandon();
                            return Err(MigratorError::Checkpoint(format!(
                                "Failed saving checkpoint after pipeline {}: {e}",
                                migrated.pipeline
                            )));
                        }
                        summary.record(&migrated);
                        progress.pipeline_migrated(&migrated.pipeline);
                    }
                    Err(e) => {
                        error!("Failed copying logs to cloud storage for pipeline {pipeline}: {e}");
                        failure.get_or_insert((pipeline, e));
                    }
                }
            }

            if let Some((pipeline, source)) = failure {
                progress.abandon();
                return Err(MigratorError::PipelineFailed {
                    pipeline: pipeline.full_repo_path(),
                    remaining: pending.len() - summary.pipelines_migrated,
                    source: Box::new(source),
                });
            }
        }

        progress.finish();
        info!("Finished migrating logs to cloud storage");

        Ok(summary)
    }

    /// Copies both log categories of a pipeline, builds before releases.
    pub async fn migrate_pipeline(&self, pipeline: &Pipeline) -> Result<MigratedPipeline> {
        info!("Start copying logs to cloud storage for pipeline {pipeline}...");

        let mut migrated = MigratedPipeline {
            pipeline: pipeline.full_repo_path(),
            builds_copied: 0,
            releases_copied: 0,
        };

        for category in LogCategory::ALL {
            let copied = self.copy_category(pipeline, category).await?;
            match category {
                LogCategory::Builds => migrated.builds_copied = copied,
                LogCategory::Releases => migrated.releases_copied = copied,
            }
        }

        info!(
            "Finished copying logs to cloud storage for pipeline {pipeline} ({} builds, {} releases)",
            migrated.builds_copied, migrated.releases_copied
        );

        Ok(migrated)
    }

    /// Copies every page of one category, `pages_in_parallel` pages at a time.
    ///
    /// A batch is inspected only after all of its pages returned. Any failed page
    /// aborts the category; otherwise a short page anywhere in the batch ends it.
    /// Returns the number of log items copied.
    pub async fn copy_category(&self, pipeline: &Pipeline, category: LogCategory) -> Result<usize> {
        let page_size = self.settings.page_size;
        let parallelism = self.settings.pages_in_parallel;

        let mut page_number = 1;
        let mut copied = 0;
        let mut reached_end = false;

        while !reached_end {
            let batch = (page_number..page_number + parallelism).map(|page_number| {
                self.api.copy_logs_page(
                    pipeline,
                    PageRequest {
                        category,
                        page_number,
                        page_size,
                    },
                )
            });

            let counts = futures::future::join_all(batch)
                .await
                .into_iter()
                .collect::<Result<Vec<usize>>>()?;

            debug!(
                "Copied {counts:?} {category} logs for pipeline {pipeline} from pages {page_number}-{}",
                page_number + parallelism - 1
            );

            copied += counts.iter().sum::<usize>();
            reached_end = counts.iter().any(|&count| is_last_page(count, page_size));
            page_number += parallelism;
        }

        Ok(copied)
    }
}
