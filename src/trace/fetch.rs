//! Object fetching and event correlation

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kube::cluster::{ClusterApi, EventQuery, ObjectTarget};
use crate::trace::error::TraceError;
use crate::trace::resolver::{ResolvedType, TypeResolver};

/// How the latest event is picked from a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrder {
    /// First item as returned by the API server
    #[default]
    Server,
    /// Highest event timestamp; events without one sort last
    Newest,
}

/// A fetched object and where it was read from
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub resolved: ResolvedType,
    /// Effective namespace, `None` for cluster-scoped objects
    pub namespace: Option<String>,
    pub document: Value,
}

/// Resolves types and reads single objects
pub struct ObjectFetcher<'a, C: ClusterApi + ?Sized> {
    resolver: &'a TypeResolver,
    cluster: &'a C,
}

impl<'a, C: ClusterApi + ?Sized> ObjectFetcher<'a, C> {
    pub fn new(resolver: &'a TypeResolver, cluster: &'a C) -> Self {
        Self { resolver, cluster }
    }

    /// Resolve the type and read the object
    ///
    /// `namespace` is only used when the resolved type is namespaced.
    pub async fn fetch(
        &self,
        name: &str,
        kind: &str,
        group: &str,
        api_version: &str,
        namespace: &str,
    ) -> Result<FetchedObject, TraceError> {
        let resolved = self.resolver.resolve(kind, group, api_version)?;
        let namespace = effective_namespace(&resolved, namespace);
        self.fetch_resolved(resolved, name, namespace).await
    }

    /// Read an object whose type is already resolved
    pub async fn fetch_resolved(
        &self,
        resolved: ResolvedType,
        name: &str,
        namespace: Option<String>,
    ) -> Result<FetchedObject, TraceError> {
        let target = ObjectTarget {
            resource: resolved.resource.clone(),
            name: name.to_string(),
            namespace: namespace.clone(),
        };

        tracing::debug!(
            "Fetching {} {} in {}",
            resolved.resource.plural,
            name,
            namespace.as_deref().unwrap_or("<cluster>")
        );
        let document = self.cluster.get_object(&target).await?;

        Ok(FetchedObject {
            resolved,
            namespace,
            document,
        })
    }
}

/// Namespace to read from: the given one for namespaced types, none otherwise
pub fn effective_namespace(resolved: &ResolvedType, namespace: &str) -> Option<String> {
    if resolved.namespaced {
        Some(namespace.to_string())
    } else {
        None
    }
}

/// Message of the latest event for an object, empty when there is none
///
/// With [`EventOrder::Server`] the first listed event is taken as is; the
/// API server does not promise recency ordering, so callers that need it
/// should use [`EventOrder::Newest`].
pub async fn latest_event<C: ClusterApi + ?Sized>(
    cluster: &C,
    query: &EventQuery,
    order: EventOrder,
) -> Result<String, TraceError> {
    let events = cluster.list_events(query).await?;

    let picked = match order {
        EventOrder::Server => events.into_iter().next(),
        EventOrder::Newest => events.into_iter().max_by_key(|e| e.timestamp),
    };

    Ok(picked.map(|e| e.message).unwrap_or_default())
}
