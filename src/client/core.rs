use log::{debug, warn};
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use url::Url;

use crate::config::{MigratorConfig, RetryPolicy};
use crate::error::{MigratorError, Result};

/// HTTP client for the source API.
///
/// Every request goes through [`ApiClient::execute`], which applies the same retry,
/// backoff and status validation policy to listing and copying alike.
pub struct ApiClient {
    client: Client,
    api_url: Url,
    api_key: String,
    retry: RetryPolicy,
    pub(super) pipelines_page_size: usize,
}

impl ApiClient {
    pub fn new(
        api_url: Url,
        api_key: String,
        pipelines_page_size: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if api_url.cannot_be_a_base() {
            return Err(MigratorError::Config(format!(
                "API URL cannot be used as a base: {api_url}"
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("log-migrator/", env!("CARGO_PKG_VERSION")))
            .timeout(retry.request_timeout)
            .build()
            .map_err(|e| MigratorError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            retry,
            pipelines_page_size,
        })
    }

    pub fn from_config(config: &MigratorConfig) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.pipelines_page_size,
            config.retry.clone(),
        )
    }

    /// Builds an endpoint URL by appending path segments to the API base URL.
    ///
    /// Each segment is percent-encoded on its own, so callers split hierarchical
    /// identifiers before passing them in.
    pub(super) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                MigratorError::Config(format!("API URL cannot be used as a base: {}", self.api_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Executes a request and returns the response body.
    ///
    /// Transport failures and 429/5xx responses are retried with exponential
    /// jittered backoff until `max_attempts` is reached. A status outside
    /// `valid_status_codes` fails the call with the response body attached.
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::Network`] when the last attempt failed at the transport
    /// level and [`MigratorError::UnexpectedStatus`] for any invalid status code.
    pub(super) async fn execute(
        &self,
        method: Method,
        url: Url,
        valid_status_codes: &[StatusCode],
    ) -> Result<Vec<u8>> {
        debug!("Handling request {method} {url}");

        let mut attempt = 1;
        loop {
            let outcome = self.attempt(method.clone(), url.clone()).await;
            let retries_left = attempt < self.retry.max_attempts;

            match outcome {
                Ok((status, body)) => {
                    if valid_status_codes.contains(&status) {
                        return Ok(body);
                    }

                    if is_transient_status(status) && retries_left {
                        let delay = backoff_delay(&self.retry, attempt);
                        warn!(
                            "Status {status} for '{method} {url}', retrying in {delay:?} ({attempt}/{})...",
                            self.retry.max_attempts
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(MigratorError::UnexpectedStatus {
                        method,
                        url: url.to_string(),
                        status,
                        valid: valid_status_codes.iter().map(StatusCode::as_u16).collect(),
                        body: String::from_utf8_lossy(&body).into_owned(),
                    });
                }
                Err(e) if is_transient_error(&e) && retries_left => {
                    let delay = backoff_delay(&self.retry, attempt);
                    warn!(
                        "Network error for '{method} {url}' ({e}), retrying in {delay:?} ({attempt}/{})...",
                        self.retry.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(MigratorError::Network {
                        method,
                        url: url.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    /// One request/response exchange, including reading the body.
    async fn attempt(
        &self,
        method: Method,
        url: Url,
    ) -> std::result::Result<(StatusCode, Vec<u8>), reqwest::Error> {
        let response = self
            .client
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        Ok((status, body.to_vec()))
    }
}

fn is_transient_error(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request() || e.is_body()
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)` plus up to
/// `base` of random jitter, never longer than the request timeout.
pub(super) fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let exponential = policy.base_delay.saturating_mul(1 << exponent);

    let base_ms = u64::try_from(policy.base_delay.as_millis()).unwrap_or(u64::MAX);
    let jitter = Duration::from_millis(rand::rng().random_range(0..=base_ms));

    exponential
        .saturating_add(jitter)
        .min(policy.request_timeout)
}
