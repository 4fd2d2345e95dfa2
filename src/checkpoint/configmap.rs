use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use reqwest::{Certificate, Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Checkpoint, CheckpointStore};
use crate::error::{MigratorError, Result};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Checkpoint kept in a Kubernetes ConfigMap of the pod's own namespace.
///
/// The checkpoint document is stored under a single data key so the ConfigMap can
/// also be mounted into the pod as a file.
pub struct ConfigMapStore {
    client: Client,
    api_server: Url,
    token: String,
    namespace: String,
    name: String,
    key: String,
}

/// The parts of a ConfigMap the store touches; everything else is passed through.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigMap {
    #[serde(default)]
    data: BTreeMap<String, String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

impl ConfigMapStore {
    pub fn new(
        client: Client,
        api_server: Url,
        token: String,
        namespace: String,
        name: String,
        key: String,
    ) -> Self {
        Self {
            client,
            api_server,
            token,
            namespace,
            name,
            key,
        }
    }

    /// Builds a store from the service account mounted into the pod.
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::Checkpoint`] when not running inside a cluster or the
    /// service account files cannot be read.
    pub fn in_cluster(name: String, key: String) -> Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| MigratorError::Checkpoint("KUBERNETES_SERVICE_HOST is not set".into()))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());

        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host
        };
        let api_server = Url::parse(&format!("https://{host}:{port}"))
            .map_err(|e| MigratorError::Checkpoint(format!("Invalid Kubernetes API address: {e}")))?;

        let dir = Path::new(SERVICE_ACCOUNT_DIR);
        let token = read_service_account_file(&dir.join("token"))?;
        let namespace = read_service_account_file(&dir.join("namespace"))?;
        let ca = fs::read(dir.join("ca.crt"))?;

        let certificate = Certificate::from_pem(&ca)
            .map_err(|e| MigratorError::Checkpoint(format!("Invalid cluster CA bundle: {e}")))?;
        let client = Client::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|e| {
                MigratorError::Checkpoint(format!("Failed to create Kubernetes client: {e}"))
            })?;

        info!("Using ConfigMap {namespace}/{name} for checkpoints");

        Ok(Self::new(client, api_server, token, namespace, name, key))
    }

    fn collection_url(&self) -> Result<Url> {
        let mut url = self.api_server.clone();
        url.path_segments_mut()
            .map_err(|()| MigratorError::Checkpoint("Invalid Kubernetes API address".into()))?
            .pop_if_empty()
            .extend(["api", "v1", "namespaces", self.namespace.as_str(), "configmaps"]);
        Ok(url)
    }

    fn configmap_url(&self) -> Result<Url> {
        let mut url = self.collection_url()?;
        url.path_segments_mut()
            .map_err(|()| MigratorError::Checkpoint("Invalid Kubernetes API address".into()))?
            .push(&self.name);
        Ok(url)
    }

    async fn fetch(&self) -> Result<Option<ConfigMap>> {
        let response = self
            .client
            .get(self.configmap_url()?)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.failure("retrieving", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| self.failure("retrieving", e))?;
        let configmap = response
            .json()
            .await
            .map_err(|e| self.failure("decoding", e))?;

        Ok(Some(configmap))
    }

    fn failure(&self, action: &str, e: impl std::fmt::Display) -> MigratorError {
        MigratorError::Checkpoint(format!(
            "Failed {action} configmap {}/{}: {e}",
            self.namespace, self.name
        ))
    }
}

impl CheckpointStore for ConfigMapStore {
    async fn load(&self) -> Result<Checkpoint> {
        let Some(configmap) = self.fetch().await? else {
            debug!("ConfigMap {} does not exist yet", self.name);
            return Ok(Checkpoint::default());
        };

        let checkpoint = configmap
            .data
            .get(&self.key)
            .map(|content| Checkpoint::from_yaml(content))
            .transpose()?
            .unwrap_or_default();

        info!(
            "Loaded {} finished pipelines from configmap {}",
            checkpoint.len(),
            self.name
        );

        Ok(checkpoint)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let content = checkpoint.to_yaml()?;

        let request = match self.fetch().await? {
            Some(mut configmap) => {
                configmap.data.insert(self.key.clone(), content);
                self.client.put(self.configmap_url()?).json(&configmap)
            }
            None => {
                let data = BTreeMap::from([(self.key.clone(), content)]);
                let configmap = serde_json::json!({
                    "apiVersion": "v1",
                    "kind": "ConfigMap",
                    "metadata": { "name": self.name },
                    "data": data,
                });
                self.client.post(self.collection_url()?).json(&configmap)
            }
        };

        request
            .bearer_auth(&self.token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.failure("updating", e))?;

        debug!(
            "Saved {} finished pipelines to configmap {}",
            checkpoint.len(),
            self.name
        );

        Ok(())
    }
}

fn read_service_account_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|content| content.trim().to_string())
        .map_err(|e| MigratorError::Checkpoint(format!("Failed reading {}: {e}", path.display())))
}
