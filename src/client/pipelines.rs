use log::{debug, error, info};
use reqwest::{Method, StatusCode};
use serde::Deserialize;

use super::core::ApiClient;
use crate::error::{MigratorError, Result};
use crate::types::Pipeline;

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<Pipeline>,
}

impl ApiClient {
    /// Fetches every pipeline using page-number pagination.
    ///
    /// Paging stops at the first empty page, so a run always ends with one request
    /// that returns no items. The last non-empty page may be full.
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::Listing`] carrying the pipelines fetched before the
    /// failing page.
    pub async fn list_all_pipelines(&self) -> Result<Vec<Pipeline>> {
        info!("Start retrieving pipelines...");

        let mut pipelines = Vec::new();
        let mut page_number = 1;
        let mut page = self
            .get_pipelines_per_page(page_number)
            .await
            .map_err(|source| partial_listing(page_number, &pipelines, source))?;

        while !page.is_empty() {
            pipelines.append(&mut page);
            page_number += 1;
            page = self
                .get_pipelines_per_page(page_number)
                .await
                .map_err(|source| partial_listing(page_number, &pipelines, source))?;
        }

        info!("Finished retrieving {} pipelines", pipelines.len());

        Ok(pipelines)
    }

    async fn get_pipelines_per_page(&self, page_number: usize) -> Result<Vec<Pipeline>> {
        let mut url = self.endpoint(&["api", "pipelines"])?;
        url.query_pairs_mut()
            .append_pair("filter[status]", "all")
            .append_pair("filter[since]", "eternity")
            .append_pair("page[number]", &page_number.to_string())
            .append_pair("page[size]", &self.pipelines_page_size.to_string());

        let body = self.execute(Method::GET, url, &[StatusCode::OK]).await?;

        let response: ListResponse = serde_json::from_slice(&body).map_err(|e| {
            let body = String::from_utf8_lossy(&body).into_owned();
            error!("Failed unmarshalling pipelines body: {e}");
            MigratorError::Parse {
                what: "pipelines",
                body,
                reason: e.to_string(),
            }
        })?;

        debug!(
            "Retrieved {} pipelines from page {page_number}",
            response.items.len()
        );

        Ok(response.items)
    }
}

fn partial_listing(page: usize, fetched: &[Pipeline], source: MigratorError) -> MigratorError {
    MigratorError::Listing {
        page,
        fetched: fetched.to_vec(),
        source: Box::new(source),
    }
}
