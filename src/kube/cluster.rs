//! Cluster access used by the graph builder
//!
//! The builder only needs three things from a cluster: the discovery
//! snapshot, point reads of arbitrary objects, and event listings filtered
//! by involved object. [`ClusterApi`] captures exactly that so the
//! traversal can run against a mock in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Event;
use kube::Api;
use kube::api::ListParams;
use kube::core::{ApiResource, DynamicObject};
use serde_json::Value;

use crate::kube::discovery::{DiscoveryCache, DiscoverySnapshot, load_snapshot};
use crate::trace::TraceError;

/// A resolved point read
#[derive(Debug, Clone)]
pub struct ObjectTarget {
    pub resource: ApiResource,
    pub name: String,
    /// `None` for cluster-scoped resources
    pub namespace: Option<String>,
}

/// Involved-object filter for event listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub api_version: String,
}

impl EventQuery {
    /// Field selector understood by the events API
    pub fn field_selector(&self) -> String {
        let mut selector = format!(
            "involvedObject.name={},involvedObject.kind={}",
            self.name, self.kind
        );
        if !self.api_version.is_empty() {
            selector.push_str(&format!(",involvedObject.apiVersion={}", self.api_version));
        }
        selector
    }
}

/// The parts of an event the correlator looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Read-only cluster operations needed to build a resource tree
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Snapshot of the served resource types
    async fn discover(&self) -> Result<DiscoverySnapshot, TraceError>;

    /// Fetch one object as a schema-less document
    async fn get_object(&self, target: &ObjectTarget) -> Result<Value, TraceError>;

    /// List events for one involved object, in server order
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventRecord>, TraceError>;
}

/// [`ClusterApi`] backed by a live kube client
#[derive(Clone)]
pub struct KubeCluster {
    client: kube::Client,
    cluster_url: String,
    cache: Option<DiscoveryCache>,
}

impl KubeCluster {
    pub fn new(client: kube::Client, cluster_url: impl Into<String>) -> Self {
        Self {
            client,
            cluster_url: cluster_url.into(),
            cache: None,
        }
    }

    /// Reuse discovery results through an on-disk cache
    pub fn with_discovery_cache(mut self, cache: DiscoveryCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn discover(&self) -> Result<DiscoverySnapshot, TraceError> {
        load_snapshot(&self.client, self.cache.as_ref(), &self.cluster_url).await
    }

    async fn get_object(&self, target: &ObjectTarget) -> Result<Value, TraceError> {
        let api: Api<DynamicObject> = match &target.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &target.resource),
            None => Api::all_with(self.client.clone(), &target.resource),
        };

        let obj = api.get(&target.name).await.map_err(|e| {
            TraceError::from_kube(
                e,
                &target.resource.kind,
                &target.name,
                target.namespace.as_deref(),
            )
        })?;

        serde_json::to_value(&obj)
            .map_err(|e| TraceError::Transport(format!("failed to decode object: {}", e)))
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventRecord>, TraceError> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), &query.namespace);
        let params = ListParams::default().fields(&query.field_selector());

        let list = api
            .list(&params)
            .await
            .map_err(|e| TraceError::Transport(e.to_string()))?;

        let mut records = Vec::with_capacity(list.items.len());
        for event in &list.items {
            match serde_json::to_value(event) {
                Ok(value) => records.push(event_record(&value)),
                Err(e) => tracing::warn!(
                    "Skipping undecodable event for {} {}: {}",
                    query.kind,
                    query.name,
                    e
                ),
            }
        }
        Ok(records)
    }
}

/// Extract message and the most meaningful timestamp from a serialized event
pub fn event_record(event: &Value) -> EventRecord {
    let timestamp = ["lastTimestamp", "eventTime", "firstTimestamp"]
        .iter()
        .filter_map(|key| event.get(*key).and_then(|t| t.as_str()))
        .find_map(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc));

    EventRecord {
        message: event
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string(),
        timestamp,
    }
}
