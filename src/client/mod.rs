mod core;
mod logs;
mod pipelines;

pub use self::core::ApiClient;

use crate::error::Result;
use crate::types::{PageRequest, Pipeline};

/// Source API operations the migrator drives.
pub trait MigrationSource {
    /// Lists every pipeline known to the source API, in API order.
    async fn list_all_pipelines(&self) -> Result<Vec<Pipeline>>;

    /// Copies one page of a pipeline's logs, returning the number of items copied.
    async fn copy_logs_page(&self, pipeline: &Pipeline, request: PageRequest) -> Result<usize>;
}

impl MigrationSource for ApiClient {
    async fn list_all_pipelines(&self) -> Result<Vec<Pipeline>> {
        ApiClient::list_all_pipelines(self).await
    }

    async fn copy_logs_page(&self, pipeline: &Pipeline, request: PageRequest) -> Result<usize> {
        ApiClient::copy_logs_page(self, pipeline, request).await
    }
}
