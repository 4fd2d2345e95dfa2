use reqwest::{Method, StatusCode};
use thiserror::Error;

use crate::types::Pipeline;

#[derive(Error, Debug)]
pub enum MigratorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error after {attempts} attempts for '{method} {url}': {source}")]
    Network {
        method: Method,
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error(
        "Status code {status} for '{method} {url}' is not one of the valid status codes {valid:?} for this request. Body: {body}"
    )]
    UnexpectedStatus {
        method: Method,
        url: String,
        status: StatusCode,
        valid: Vec<u16>,
        body: String,
    },

    #[error("Failed parsing {what} from response body '{body}': {reason}")]
    Parse {
        what: &'static str,
        body: String,
        reason: String,
    },

    #[error("Failed listing pipelines at page {page} after {} pipelines", .fetched.len())]
    Listing {
        page: usize,
        fetched: Vec<Pipeline>,
        #[source]
        source: Box<MigratorError>,
    },

    #[error("Failed copying logs for pipeline {pipeline} ({remaining} pipelines remaining unprocessed)")]
    PipelineFailed {
        pipeline: String,
        remaining: usize,
        #[source]
        source: Box<MigratorError>,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigratorError {
    /// Number of pipelines left unprocessed when a run aborts, if known.
    pub fn remaining_pipelines(&self) -> Option<usize> {
        match self {
            Self::PipelineFailed { remaining, .. } => Some(*remaining),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MigratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_failure_reports_cause_once_in_chain() {
        let err = anyhow::Error::new(MigratorError::PipelineFailed {
            pipeline: "github.com/estafette/api".into(),
            remaining: 3,
            source: Box::new(MigratorError::Checkpoint("store unavailable".into())),
        });

        let chain = format!("{err:#}");
        assert_eq!(chain.matches("store unavailable").count(), 1);
        assert!(chain.contains("3 pipelines remaining unprocessed"));
        assert_eq!(
            err.downcast_ref::<MigratorError>()
                .and_then(MigratorError::remaining_pipelines),
            Some(3)
        );
    }
}
