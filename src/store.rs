//! Access to the external mapping store holding each fact's period.

use crate::error::{Result, ShiftError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Scheme of the mapping entry that carries the fact's own period.
pub const INTERNAL_SCHEME: &str = "internal";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default)]
    pub is_absolute: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_option: Option<String>,
    /// Attributes this crate does not interpret; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MappingEntry {
    pub fn internal(period: impl Into<String>) -> Self {
        Self {
            scheme: INTERNAL_SCHEME.to_string(),
            period: Some(period.into()),
            is_absolute: false,
            context: None,
            datatype: None,
            display_option: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingCluster {
    pub fact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub entries: Vec<MappingEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MappingCluster {
    pub fn new(fact_id: impl Into<String>, entries: Vec<MappingEntry>) -> Self {
        Self {
            fact_id: fact_id.into(),
            project_id: None,
            request_id: None,
            entries,
            extra: Map::new(),
        }
    }

    pub fn internal(&self) -> Option<&MappingEntry> {
        self.entries.iter().find(|e| e.scheme == INTERNAL_SCHEME)
    }

    pub fn internal_mut(&mut self) -> Option<&mut MappingEntry> {
        self.entries.iter_mut().find(|e| e.scheme == INTERNAL_SCHEME)
    }

    /// Copy of the cluster ready to be written back: project set, transient
    /// request id removed.
    pub fn for_update(&self, project_id: &str) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            request_id: None,
            ..self.clone()
        }
    }
}

#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Batched read of the clusters of `fact_ids`. Facts without a cluster
    /// are simply absent from the result.
    async fn fetch_clusters(
        &self,
        project_id: &str,
        fact_ids: &[String],
    ) -> Result<Vec<MappingCluster>>;

    /// Replaces one cluster.
    async fn update_cluster(&self, project_id: &str, cluster: &MappingCluster) -> Result<()>;
}

/// Store kept in memory, keyed by project and fact. Records every write.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    clusters: Mutex<BTreeMap<String, BTreeMap<String, MappingCluster>>>,
    writes: Mutex<Vec<MappingCluster>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project_id: &str, cluster: MappingCluster) -> Result<()> {
        let mut clusters = self.clusters.lock().map_err(poisoned)?;
        clusters
            .entry(project_id.to_string())
            .or_default()
            .insert(cluster.fact_id.clone(), cluster);
        Ok(())
    }

    pub fn get(&self, project_id: &str, fact_id: &str) -> Result<Option<MappingCluster>> {
        let clusters = self.clusters.lock().map_err(poisoned)?;
        Ok(clusters
            .get(project_id)
            .and_then(|facts| facts.get(fact_id))
            .cloned())
    }

    /// Every cluster written so far, in write order.
    pub fn writes(&self) -> Result<Vec<MappingCluster>> {
        Ok(self.writes.lock().map_err(poisoned)?.clone())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> ShiftError {
    ShiftError::Store("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn fetch_clusters(
        &self,
        project_id: &str,
        fact_ids: &[String],
    ) -> Result<Vec<MappingCluster>> {
        let clusters = self.clusters.lock().map_err(poisoned)?;
        let Some(facts) = clusters.get(project_id) else {
            return Ok(Vec::new());
        };
        Ok(fact_ids
            .iter()
            .filter_map(|id| facts.get(id))
            .cloned()
            .collect())
    }

    async fn update_cluster(&self, project_id: &str, cluster: &MappingCluster) -> Result<()> {
        self.insert(project_id, cluster.clone())?;
        self.writes.lock().map_err(poisoned)?.push(cluster.clone());
        Ok(())
    }
}

#[cfg(feature = "http")]
pub use http::HttpMappingStore;

#[cfg(feature = "http")]
mod http {
    use super::{MappingCluster, MappingStore};
    use crate::config::ShiftConfig;
    use crate::error::{Result, ShiftError};
    use async_trait::async_trait;
    use log::{debug, info};
    use reqwest::Client;
    use serde::Serialize;
    use std::time::Duration;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct QueryRequest<'a> {
        project_id: &'a str,
        fact_ids: &'a [String],
    }

    /// Mapping store reached over HTTP:
    /// `POST {base}/mappings/query` and `PUT {base}/mappings/{fact_id}`.
    #[derive(Clone)]
    pub struct HttpMappingStore {
        client: Client,
        base_url: String,
    }

    impl HttpMappingStore {
        pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
            let client = Client::builder().timeout(timeout).build()?;
            Ok(Self {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            })
        }

        pub fn from_config(config: &ShiftConfig) -> Result<Self> {
            let base_url = config.store_url.as_deref().ok_or_else(|| {
                ShiftError::InvalidConfig("store_url is required for the HTTP store".to_string())
            })?;
            Self::new(base_url, Duration::from_secs(config.request_timeout_secs))
        }

        async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let body = response.text().await.unwrap_or_default();
            Err(ShiftError::Store(format!(
                "{} failed (status {}): {}",
                what, status, body
            )))
        }
    }

    #[async_trait]
    impl MappingStore for HttpMappingStore {
        async fn fetch_clusters(
            &self,
            project_id: &str,
            fact_ids: &[String],
        ) -> Result<Vec<MappingCluster>> {
            let url = format!("{}/mappings/query", self.base_url);
            info!("Fetching {} mapping clusters from {}", fact_ids.len(), url);
            let response = self
                .client
                .post(&url)
                .json(&QueryRequest {
                    project_id,
                    fact_ids,
                })
                .send()
                .await?;
            let clusters: Vec<MappingCluster> =
                Self::check(response, "mapping query").await?.json().await?;
            debug!("Received {} mapping clusters", clusters.len());
            Ok(clusters)
        }

        async fn update_cluster(&self, project_id: &str, cluster: &MappingCluster) -> Result<()> {
            let url = format!("{}/mappings/{}", self.base_url, cluster.fact_id);
            debug!("Updating mapping cluster {} for project {}", cluster.fact_id, project_id);
            let response = self.client.put(&url).json(cluster).send().await?;
            Self::check(response, "mapping update").await?;
            Ok(())
        }
    }
}
