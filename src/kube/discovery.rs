//! API discovery snapshot
//!
//! Builds a flat list of served resource types from the core `/api/v1`
//! listing and the preferred version of every `/apis` group, and keeps it in
//! an on-disk cache so repeated invocations do not walk the whole API surface.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use futures::{StreamExt, stream};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use serde::{Deserialize, Serialize};

use crate::trace::TraceError;

/// Parallel group listings while building a snapshot
const DISCOVERY_CONCURRENCY: usize = 8;

/// One served resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredResource {
    /// Empty for the core group
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Plural resource name, as used in REST paths
    pub plural: String,
    #[serde(default)]
    pub singular: String,
    #[serde(default)]
    pub short_names: Vec<String>,
    pub namespaced: bool,
}

/// Resource types served by a cluster, core group first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySnapshot {
    pub resources: Vec<DiscoveredResource>,
}

impl DiscoverySnapshot {
    pub fn new(resources: Vec<DiscoveredResource>) -> Self {
        Self { resources }
    }

    /// Query the API server for all preferred resource types
    pub async fn fetch(client: &kube::Client) -> Result<Self, TraceError> {
        let mut resources = Vec::new();

        let core = client
            .list_core_api_resources("v1")
            .await
            .map_err(|e| TraceError::ScopeDetermination(e.to_string()))?;
        resources.extend(flatten_resource_list(&core));

        let groups = client
            .list_api_groups()
            .await
            .map_err(|e| TraceError::ScopeDetermination(e.to_string()))?;

        let group_versions: Vec<String> = groups
            .groups
            .iter()
            .filter_map(|g| {
                g.preferred_version
                    .as_ref()
                    .or_else(|| g.versions.first())
                    .map(|v| v.group_version.clone())
            })
            .collect();

        // buffered() keeps server order, so the snapshot is stable between runs
        let listings: Vec<(String, Result<APIResourceList, kube::Error>)> =
            stream::iter(group_versions)
                .map(|gv| async move {
                    let listed = client.list_api_group_resources(&gv).await;
                    (gv, listed)
                })
                .buffered(DISCOVERY_CONCURRENCY)
                .collect()
                .await;

        for (gv, listed) in listings {
            match listed {
                Ok(list) => resources.extend(flatten_resource_list(&list)),
                Err(e) => {
                    // Aggregated APIs are often unavailable; kubectl skips them too
                    tracing::warn!("Skipping API group {} during discovery: {}", gv, e);
                }
            }
        }

        tracing::debug!("Discovered {} resource types", resources.len());
        Ok(Self { resources })
    }
}

/// Convert one `APIResourceList` into snapshot entries, dropping subresources
pub fn flatten_resource_list(list: &APIResourceList) -> Vec<DiscoveredResource> {
    let (group, version) = match list.group_version.split_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), list.group_version.clone()),
    };

    list.resources
        .iter()
        .filter(|r| !r.name.contains('/'))
        .map(|r| DiscoveredResource {
            group: r.group.clone().unwrap_or_else(|| group.clone()),
            version: r.version.clone().unwrap_or_else(|| version.clone()),
            kind: r.kind.clone(),
            plural: r.name.clone(),
            singular: r.singular_name.clone(),
            short_names: r.short_names.clone().unwrap_or_default(),
            namespaced: r.namespaced,
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedSnapshot {
    fetched_at: DateTime<Utc>,
    snapshot: DiscoverySnapshot,
}

/// File backed cache for discovery snapshots
#[derive(Debug, Clone)]
pub struct DiscoveryCache {
    dir: PathBuf,
    ttl: Duration,
}

impl DiscoveryCache {
    pub fn new(dir: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::seconds(i64::from(u32::try_from(ttl_seconds).unwrap_or(u32::MAX))),
        }
    }

    /// Cache file for a cluster, keyed by its API server URL
    pub fn path_for(&self, cluster_url: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", sanitize_cache_key(cluster_url)))
    }

    /// Read a snapshot if the cache file exists and is younger than the TTL
    pub fn read(&self, cluster_url: &str, now: DateTime<Utc>) -> Option<DiscoverySnapshot> {
        let path = self.path_for(cluster_url);
        let contents = std::fs::read_to_string(&path).ok()?;
        let cached: CachedSnapshot = match serde_json::from_str(&contents) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Ignoring corrupt discovery cache {}: {}", path.display(), e);
                return None;
            }
        };

        if now - cached.fetched_at > self.ttl {
            tracing::debug!("Discovery cache {} is stale", path.display());
            return None;
        }
        Some(cached.snapshot)
    }

    /// Persist a snapshot, stamped with `now`
    pub fn write(
        &self,
        cluster_url: &str,
        snapshot: &DiscoverySnapshot,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        use anyhow::Context;

        crate::config::paths::ensure_dir(&self.dir)?;
        let path = self.path_for(cluster_url);
        let body = serde_json::to_string(&CachedSnapshot {
            fetched_at: now,
            snapshot: snapshot.clone(),
        })?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write discovery cache: {}", path.display()))
    }

    /// Drop the cached snapshot of a cluster so the next load refetches it
    pub fn invalidate(&self, cluster_url: &str) {
        let path = self.path_for(cluster_url);
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed discovery cache {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove discovery cache {}: {}", path.display(), e),
        }
    }
}

/// Load a snapshot from the cache, or fetch and store it
pub async fn load_snapshot(
    client: &kube::Client,
    cache: Option<&DiscoveryCache>,
    cluster_url: &str,
) -> Result<DiscoverySnapshot, TraceError> {
    let now = Utc::now();

    if let Some(cache) = cache {
        if let Some(snapshot) = cache.read(cluster_url, now) {
            tracing::debug!("Using cached discovery for {}", cluster_url);
            return Ok(snapshot);
        }
    }

    let snapshot = DiscoverySnapshot::fetch(client).await?;

    if let Some(cache) = cache {
        if let Err(e) = cache.write(cluster_url, &snapshot, now) {
            tracing::warn!("Failed to store discovery cache: {:#}", e);
        }
    }
    Ok(snapshot)
}

/// Turn a server URL into a file name (`https://10.0.0.1:6443` -> `10.0.0.1_6443`)
fn sanitize_cache_key(cluster_url: &str) -> String {
    let host_port = url::Url::parse(cluster_url)
        .ok()
        .and_then(|u| {
            u.host_str().map(|h| match u.port() {
                Some(port) => format!("{}:{}", h, port),
                None => h.to_string(),
            })
        })
        .unwrap_or_else(|| cluster_url.to_string());

    host_port
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
