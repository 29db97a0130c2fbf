//! Graph builder for claim/composite reference trees
//!
//! Starting from a root object, follows `spec.resourceRef` or
//! `spec.resourceRefs[]` recursively and assembles a [`ResourceNode`] tree.
//! Sibling subtrees are expanded concurrently and children keep the order of
//! the reference sequence. One semaphore bounds the cluster requests in flight
//! across the whole tree.

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::kube::cluster::{ClusterApi, EventQuery};
use crate::trace::error::TraceError;
use crate::trace::fetch::{EventOrder, FetchedObject, ObjectFetcher, effective_namespace, latest_event};
use crate::trace::models::{BranchFailure, ResourceNode};
use crate::trace::references::{ChildRef, RefEntry, child_refs};
use crate::trace::resolver::TypeResolver;

/// What happens when a child reference cannot be expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildErrorPolicy {
    /// Record a failed node in place and keep expanding its siblings
    #[default]
    Continue,
    /// Stop the whole build at the first failing child
    Abort,
}

/// Per-invocation traversal settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceOptions {
    /// Cluster requests in flight at once, over the whole build
    pub concurrency: usize,
    pub on_child_error: ChildErrorPolicy,
    pub event_order: EventOrder,
    /// Namespace holding events of cluster-scoped objects
    pub cluster_event_namespace: String,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            on_child_error: ChildErrorPolicy::Continue,
            event_order: EventOrder::Server,
            cluster_event_namespace: "default".to_string(),
        }
    }
}

/// Identity of a node on the current ancestor path
#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeKey(String);

impl NodeKey {
    fn new(gvk: &str, namespace: Option<&str>, name: &str) -> Self {
        NodeKey(format!("{}:{}:{}", gvk, namespace.unwrap_or(""), name))
    }
}

/// Ancestors of the node being expanded
#[derive(Debug, Clone, Default)]
struct Lineage {
    keys: Vec<NodeKey>,
    labels: Vec<String>,
}

impl Lineage {
    fn child(&self, key: NodeKey, label: String) -> Self {
        let mut next = self.clone();
        next.keys.push(key);
        next.labels.push(label);
        next
    }

    fn path_to(&self, label: &str) -> String {
        self.labels
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(label))
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

/// Builds resource trees against one cluster
pub struct GraphBuilder<C: ClusterApi> {
    cluster: C,
    resolver: TypeResolver,
    options: TraceOptions,
    requests: Semaphore,
}

impl<C: ClusterApi> GraphBuilder<C> {
    pub fn new(cluster: C, resolver: TypeResolver, options: TraceOptions) -> Self {
        Self {
            cluster,
            resolver,
            requests: Semaphore::new(options.concurrency.max(1)),
            options,
        }
    }

    /// Query discovery through the cluster and build a builder from it
    pub async fn connect(cluster: C, options: TraceOptions) -> Result<Self, TraceError> {
        let snapshot = cluster.discover().await?;
        Ok(Self::new(cluster, TypeResolver::new(snapshot), options))
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Build the full tree rooted at `kind`/`name`
    ///
    /// `kind` may be qualified (`xstorages.example.org`) or come with an
    /// explicit `group`; `version` is a bare version or empty. Any failure on
    /// the root itself is returned; child failures follow
    /// [`TraceOptions::on_child_error`].
    pub async fn build(
        &self,
        kind: &str,
        group: &str,
        version: &str,
        name: &str,
        namespace: &str,
    ) -> Result<ResourceNode, TraceError> {
        let resolved = self.resolver.resolve_version(kind, group, version)?;
        let effective = effective_namespace(&resolved, namespace);
        let fetched = {
            let _permit = self.request_permit().await?;
            ObjectFetcher::new(&self.resolver, &self.cluster)
                .fetch_resolved(resolved, name, effective)
                .await?
        };

        let key = NodeKey::new(&fetched.resolved.gvk_key(), fetched.namespace.as_deref(), name);
        let label = format!("{}/{}", fetched.resolved.resource.kind, name);
        let lineage = Lineage::default().child(key, label);

        let node = self.expand(fetched, namespace.to_string(), lineage).await?;
        tracing::debug!(
            "Built tree for {} with {} nodes",
            node.display_id(),
            node.node_count()
        );
        Ok(node)
    }

    /// Attach the event and children of an already fetched object
    fn expand<'a>(
        &'a self,
        fetched: FetchedObject,
        inherited_namespace: String,
        lineage: Lineage,
    ) -> BoxFuture<'a, Result<ResourceNode, TraceError>> {
        async move {
            let node = ResourceNode::from_document(fetched.document);

            let event_query = EventQuery {
                namespace: fetched
                    .namespace
                    .clone()
                    .unwrap_or_else(|| self.options.cluster_event_namespace.clone()),
                name: node.name().to_string(),
                kind: node.kind().to_string(),
                api_version: node.api_version().to_string(),
            };
            let event = {
                let _permit = self.request_permit().await?;
                latest_event(&self.cluster, &event_query, self.options.event_order).await
            };
            // A missing event never costs the object or its subtree
            let event = event.unwrap_or_else(|e| {
                tracing::warn!("Event lookup failed for {}: {}", node.display_id(), e);
                String::new()
            });

            // Cluster-scoped parents pass on what they inherited themselves
            let child_namespace = fetched.namespace.unwrap_or(inherited_namespace);

            let refs = child_refs(node.raw_state(), &lineage.labels.join(" > "));
            let children: Vec<Result<ResourceNode, TraceError>> = stream::iter(refs)
                .map(|entry| self.build_child(entry, &child_namespace, &lineage))
                .buffered(self.options.concurrency.max(1))
                .collect()
                .await;

            let children = children.into_iter().collect::<Result<Vec<_>, _>>()?;
            Ok(node.with_event(event).with_children(children))
        }
        .boxed()
    }

    /// Resolve, fetch and expand one child reference
    async fn build_child(
        &self,
        entry: RefEntry,
        parent_namespace: &str,
        lineage: &Lineage,
    ) -> Result<ResourceNode, TraceError> {
        let child = match entry {
            RefEntry::Valid(child) => child,
            RefEntry::Malformed {
                kind,
                name,
                api_version,
                error,
            } => {
                let label = format!("{}/{}", kind, name);
                return self.child_failed(
                    &kind,
                    &api_version,
                    &name,
                    parent_namespace,
                    lineage.path_to(&label),
                    error,
                );
            }
        };

        let label = format!("{}/{}", child.kind, child.name);
        let path = lineage.path_to(&label);
        let namespace = child
            .namespace
            .clone()
            .unwrap_or_else(|| parent_namespace.to_string());

        match self.fetch_child(&child, &namespace, lineage, label).await {
            Ok(node) => Ok(node),
            Err(err @ TraceError::Branch { .. }) => Err(err),
            Err(err) => self.child_failed(
                &child.kind,
                &child.api_version,
                &child.name,
                &namespace,
                path,
                err,
            ),
        }
    }

    async fn fetch_child(
        &self,
        child: &ChildRef,
        namespace: &str,
        lineage: &Lineage,
        label: String,
    ) -> Result<ResourceNode, TraceError> {
        let resolved = self.resolver.resolve(&child.kind, "", &child.api_version)?;
        let effective = effective_namespace(&resolved, namespace);

        let key = NodeKey::new(&resolved.gvk_key(), effective.as_deref(), &child.name);
        if lineage.keys.contains(&key) {
            return Err(TraceError::CyclicReference { key: key.0 });
        }

        let fetched = {
            let _permit = self.request_permit().await?;
            ObjectFetcher::new(&self.resolver, &self.cluster)
                .fetch_resolved(resolved, &child.name, effective)
                .await?
        };

        self.expand(fetched, namespace.to_string(), lineage.child(key, label))
            .await
    }

    /// Permits are held for a single request, never across child expansion
    async fn request_permit(&self) -> Result<SemaphorePermit<'_>, TraceError> {
        self.requests
            .acquire()
            .await
            .map_err(|e| TraceError::Transport(e.to_string()))
    }

    /// Apply the child error policy
    fn child_failed(
        &self,
        kind: &str,
        api_version: &str,
        name: &str,
        namespace: &str,
        path: String,
        error: TraceError,
    ) -> Result<ResourceNode, TraceError> {
        match self.options.on_child_error {
            ChildErrorPolicy::Abort => Err(TraceError::Branch {
                path,
                source: Box::new(error),
            }),
            ChildErrorPolicy::Continue => {
                tracing::warn!("Skipping branch {}: {}", path, error);
                Ok(ResourceNode::failed(
                    kind,
                    api_version,
                    name,
                    namespace,
                    BranchFailure {
                        path,
                        reason: error.to_string(),
                    },
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::cluster::{EventRecord, MockClusterApi, ObjectTarget};
    use crate::kube::discovery::{DiscoveredResource, DiscoverySnapshot};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn entry(group: &str, kind: &str, namespaced: bool) -> DiscoveredResource {
        let singular = kind.to_lowercase();
        DiscoveredResource {
            group: group.to_string(),
            version: "v1".to_string(),
            kind: kind.to_string(),
            plural: format!("{}s", singular),
            singular,
            short_names: vec![],
            namespaced,
        }
    }

    fn snapshot() -> DiscoverySnapshot {
        DiscoverySnapshot::new(vec![
            entry("example.org", "ObjectStorage", true),
            entry("example.org", "XObjectStorage", true),
            entry("example.org", "XNetwork", false),
            entry("s3.aws", "Bucket", true),
            entry("ec2.aws", "Vpc", false),
            entry("chain.example", "Link", true),
        ])
    }

    fn object(api_version: &str, kind: &str, name: &str, namespace: Option<&str>, spec: Value) -> Value {
        let mut metadata = json!({"name": name});
        if let Some(ns) = namespace {
            metadata["namespace"] = json!(ns);
        }
        json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": metadata,
            "spec": spec
        })
    }

    fn reference(api_version: &str, kind: &str, name: &str) -> Value {
        json!({"apiVersion": api_version, "kind": kind, "name": name})
    }

    type Reads = Arc<Mutex<Vec<(String, Option<String>)>>>;

    /// Mock cluster serving `objects`, recording every point read
    fn cluster(objects: Vec<Value>) -> (MockClusterApi, Reads) {
        let reads: Reads = Arc::default();
        let recorded = reads.clone();

        let mut cluster = MockClusterApi::new();
        cluster.expect_get_object().returning(move |t| {
            recorded
                .lock()
                .unwrap()
                .push((t.name.clone(), t.namespace.clone()));
            objects
                .iter()
                .find(|o| {
                    o["kind"] == t.resource.kind
                        && o["metadata"]["name"] == t.name.as_str()
                        && o["metadata"]["namespace"].as_str() == t.namespace.as_deref()
                })
                .cloned()
                .ok_or_else(|| TraceError::ObjectNotFound {
                    kind: t.resource.kind.clone(),
                    name: t.name.clone(),
                    namespace: t.namespace.clone(),
                })
        });
        cluster.expect_list_events().returning(|_| Ok(vec![]));
        (cluster, reads)
    }

    fn builder(cluster: MockClusterApi, options: TraceOptions) -> GraphBuilder<MockClusterApi> {
        GraphBuilder::new(cluster, TypeResolver::new(snapshot()), options)
    }

    fn storage_with_refs(refs: Vec<Value>) -> Value {
        object(
            "example.org/v1",
            "XObjectStorage",
            "storage",
            Some("team-a"),
            json!({"resourceRefs": refs}),
        )
    }

    fn bucket(name: &str) -> Value {
        object("s3.aws/v1", "Bucket", name, Some("team-a"), json!({}))
    }

    #[tokio::test]
    async fn test_leaf_root_has_single_node() {
        let (cluster, _) = cluster(vec![bucket("bucket-1")]);
        let root = builder(cluster, TraceOptions::default())
            .build("bucket", "", "", "bucket-1", "team-a")
            .await
            .unwrap();
        assert_eq!(root.node_count(), 1);
        assert_eq!(root.kind(), "Bucket");
    }

    #[tokio::test]
    async fn test_root_with_bare_version_resolves_custom_group() {
        let (cluster, _) = cluster(vec![bucket("bucket-1")]);
        let root = builder(cluster, TraceOptions::default())
            .build("bucket", "", "v1", "bucket-1", "team-a")
            .await
            .unwrap();
        assert_eq!(root.api_version(), "s3.aws/v1");
    }

    #[tokio::test]
    async fn test_single_reference_chain_depth() {
        let link = |i: usize| {
            let spec = if i < 2 {
                json!({"resourceRef": reference("chain.example/v1", "Link", &format!("link-{}", i + 1))})
            } else {
                json!({})
            };
            object("chain.example/v1", "Link", &format!("link-{}", i), Some("ns"), spec)
        };
        let (cluster, _) = cluster((0..3).map(link).collect());

        let root = builder(cluster, TraceOptions::default())
            .build("link", "", "", "link-0", "ns")
            .await
            .unwrap();

        assert_eq!(root.depth(), 3);
        assert_eq!(root.node_count(), 3);
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].children().len(), 1);
        assert_eq!(root.children()[0].children()[0].name(), "link-2");
    }

    #[tokio::test]
    async fn test_multi_reference_order_is_preserved() {
        let refs = ["c1", "c2", "c3"]
            .iter()
            .map(|n| reference("s3.aws/v1", "Bucket", n))
            .collect();
        let (cluster, _) = cluster(vec![
            storage_with_refs(refs),
            bucket("c1"),
            bucket("c2"),
            bucket("c3"),
        ]);

        let options = TraceOptions {
            concurrency: 3,
            ..Default::default()
        };
        let root = builder(cluster, options)
            .build("XObjectStorage", "", "", "storage", "team-a")
            .await
            .unwrap();

        let names: Vec<&str> = root.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_resource_ref_scenario() {
        let root_doc = object(
            "example.org/v1",
            "XObjectStorage",
            "my-storage",
            Some("team-a"),
            json!({"resourceRef": reference("s3.aws/v1", "Bucket", "bucket-1")}),
        );
        let (cluster, _) = cluster(vec![root_doc, bucket("bucket-1")]);

        let root = builder(cluster, TraceOptions::default())
            .build("XObjectStorage", "", "", "my-storage", "team-a")
            .await
            .unwrap();

        assert_eq!(root.children().len(), 1);
        let child = &root.children()[0];
        assert_eq!(child.kind(), "Bucket");
        assert_eq!(child.name(), "bucket-1");
        assert_eq!(child.namespace(), "team-a");
    }

    #[tokio::test]
    async fn test_namespace_inherited_through_cluster_scoped_parent() {
        let claim = object(
            "example.org/v1",
            "ObjectStorage",
            "claim",
            Some("ns-a"),
            json!({"resourceRef": reference("example.org/v1", "XNetwork", "xr")}),
        );
        let xr = object(
            "example.org/v1",
            "XNetwork",
            "xr",
            None,
            json!({"resourceRefs": [
                reference("ec2.aws/v1", "Vpc", "vpc-1"),
                reference("s3.aws/v1", "Bucket", "logs")
            ]}),
        );
        let vpc = object("ec2.aws/v1", "Vpc", "vpc-1", None, json!({}));
        let logs = object("s3.aws/v1", "Bucket", "logs", Some("ns-a"), json!({}));
        let (cluster, reads) = cluster(vec![claim, xr, vpc, logs]);

        let root = builder(cluster, TraceOptions::default())
            .build("objectstorage", "", "", "claim", "ns-a")
            .await
            .unwrap();

        assert_eq!(root.node_count(), 4);
        assert!(root.children()[0].children().iter().all(|c| c.failure().is_none()));

        let reads = reads.lock().unwrap().clone();
        assert!(reads.contains(&("xr".to_string(), None)));
        assert!(reads.contains(&("vpc-1".to_string(), None)));
        assert!(reads.contains(&("logs".to_string(), Some("ns-a".to_string()))));
    }

    #[tokio::test]
    async fn test_reference_namespace_overrides_inherited() {
        let mut override_ref = reference("s3.aws/v1", "Bucket", "shared");
        override_ref["namespace"] = json!("platform");
        let shared = object("s3.aws/v1", "Bucket", "shared", Some("platform"), json!({}));
        let (cluster, _) = cluster(vec![storage_with_refs(vec![override_ref]), shared]);

        let root = builder(cluster, TraceOptions::default())
            .build("XObjectStorage", "", "", "storage", "team-a")
            .await
            .unwrap();
        assert_eq!(root.children()[0].namespace(), "platform");
    }

    #[tokio::test]
    async fn test_failed_child_does_not_stop_siblings() {
        let refs = vec![
            reference("s3.aws/v1", "Bucket", "c1"),
            reference("s3.aws/v1", "Bucket", "missing"),
            reference("unknown.io/v1", "Widget", "w"),
            json!({"kind": "Bucket", "name": "no-version"}),
            reference("s3.aws/v1", "Bucket", "c3"),
        ];
        let (cluster, _) = cluster(vec![storage_with_refs(refs), bucket("c1"), bucket("c3")]);

        let root = builder(cluster, TraceOptions::default())
            .build("XObjectStorage", "", "", "storage", "team-a")
            .await
            .unwrap();

        let children = root.children();
        assert_eq!(children.len(), 5);
        assert!(children[0].failure().is_none());
        assert!(children[4].failure().is_none());

        let missing = children[1].failure().unwrap();
        assert_eq!(missing.path, "XObjectStorage/storage > Bucket/missing");
        assert!(missing.reason.contains("not found"));
        assert_eq!(children[1].name(), "missing");
        assert_eq!(children[1].namespace(), "team-a");

        let widget = children[2].failure().unwrap();
        assert!(widget.reason.contains("no API resource found"));

        let malformed = children[3].failure().unwrap();
        assert!(malformed.reason.contains("missing apiVersion"));
    }

    #[tokio::test]
    async fn test_abort_policy_stops_at_first_failure() {
        let refs = vec![
            reference("s3.aws/v1", "Bucket", "c1"),
            reference("s3.aws/v1", "Bucket", "missing"),
        ];
        let (cluster, _) = cluster(vec![storage_with_refs(refs), bucket("c1")]);

        let options = TraceOptions {
            on_child_error: ChildErrorPolicy::Abort,
            ..Default::default()
        };
        let err = builder(cluster, options)
            .build("XObjectStorage", "", "", "storage", "team-a")
            .await
            .unwrap_err();

        match &err {
            TraceError::Branch { path, .. } => {
                assert_eq!(path, "XObjectStorage/storage > Bucket/missing")
            }
            other => panic!("expected branch error, got {:?}", other),
        }
        assert!(matches!(err.root_cause(), TraceError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let (cluster, _) = cluster(vec![]);
        let err = builder(cluster, TraceOptions::default())
            .build("XObjectStorage", "", "", "nope", "team-a")
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_cycle_is_reported_not_followed() {
        let a = object(
            "chain.example/v1",
            "Link",
            "a",
            Some("ns"),
            json!({"resourceRef": reference("chain.example/v1", "Link", "b")}),
        );
        let b = object(
            "chain.example/v1",
            "Link",
            "b",
            Some("ns"),
            json!({"resourceRef": reference("chain.example/v1", "Link", "a")}),
        );
        let (cluster, reads) = cluster(vec![a, b]);

        let root = builder(cluster, TraceOptions::default())
            .build("link", "", "", "a", "ns")
            .await
            .unwrap();

        let back_edge = &root.children()[0].children()[0];
        let failure = back_edge.failure().unwrap();
        assert!(failure.reason.starts_with("cyclic reference"));
        assert_eq!(failure.path, "Link/a > Link/b > Link/a");
        assert_eq!(reads.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_shared_reference_is_not_a_cycle() {
        let refs = vec![
            reference("s3.aws/v1", "Bucket", "c1"),
            reference("s3.aws/v1", "Bucket", "c1"),
        ];
        let (cluster, _) = cluster(vec![storage_with_refs(refs), bucket("c1")]);

        let root = builder(cluster, TraceOptions::default())
            .build("XObjectStorage", "", "", "storage", "team-a")
            .await
            .unwrap();
        assert!(root.children().iter().all(|c| c.failure().is_none()));
    }

    #[tokio::test]
    async fn test_events_attached_per_node() {
        let objects = vec![
            object(
                "example.org/v1",
                "XNetwork",
                "net",
                None,
                json!({"resourceRef": reference("s3.aws/v1", "Bucket", "bucket-1")}),
            ),
            bucket("bucket-1"),
        ];
        let queries: Arc<Mutex<Vec<EventQuery>>> = Arc::default();
        let recorded = queries.clone();

        let mut cluster = MockClusterApi::new();
        cluster.expect_get_object().returning(move |t| {
            objects
                .iter()
                .find(|o| o["metadata"]["name"] == t.name.as_str())
                .cloned()
                .ok_or_else(|| TraceError::Transport("unexpected read".to_string()))
        });
        cluster.expect_list_events().returning(move |q| {
            recorded.lock().unwrap().push(q.clone());
            if q.name == "bucket-1" {
                Ok(vec![EventRecord {
                    message: "cannot create bucket".to_string(),
                    timestamp: None,
                }])
            } else {
                Ok(vec![])
            }
        });

        let root = builder(cluster, TraceOptions::default())
            .build("xnetwork", "", "", "net", "team-a")
            .await
            .unwrap();

        assert_eq!(root.latest_event(), "");
        assert_eq!(root.children()[0].latest_event(), "cannot create bucket");

        let queries = queries.lock().unwrap();
        assert_eq!(queries[0].namespace, "default");
        assert_eq!(queries[0].kind, "XNetwork");
        assert_eq!(queries[1].namespace, "team-a");
        assert_eq!(queries[1].api_version, "s3.aws/v1");
    }

    #[tokio::test]
    async fn test_event_failure_keeps_node_and_subtree() {
        let objects = vec![
            storage_with_refs(vec![reference("s3.aws/v1", "Bucket", "c1")]),
            bucket("c1"),
        ];

        let mut cluster = MockClusterApi::new();
        cluster.expect_get_object().returning(move |t| {
            objects
                .iter()
                .find(|o| o["metadata"]["name"] == t.name.as_str())
                .cloned()
                .ok_or_else(|| TraceError::Transport("unexpected read".to_string()))
        });
        cluster
            .expect_list_events()
            .returning(|_| Err(TraceError::Transport("events is forbidden".to_string())));

        let root = builder(cluster, TraceOptions::default())
            .build("XObjectStorage", "", "", "storage", "team-a")
            .await
            .unwrap();

        assert_eq!(root.node_count(), 2);
        assert_eq!(root.latest_event(), "");
        let child = &root.children()[0];
        assert!(child.failure().is_none());
        assert_eq!(child.name(), "c1");
        assert_eq!(child.latest_event(), "");
    }

    #[tokio::test]
    async fn test_requests_share_one_limit_across_levels() {
        let mut objects = Vec::new();
        let parents = ["a", "b", "c", "d"];
        objects.push(object(
            "chain.example/v1",
            "Link",
            "root",
            Some("ns"),
            json!({"resourceRefs": parents
                .iter()
                .map(|p| reference("chain.example/v1", "Link", p))
                .collect::<Vec<_>>()}),
        ));
        for parent in parents {
            let leaves: Vec<String> = (0..3).map(|i| format!("{}-{}", parent, i)).collect();
            objects.push(object(
                "chain.example/v1",
                "Link",
                parent,
                Some("ns"),
                json!({"resourceRefs": leaves
                    .iter()
                    .map(|l| reference("chain.example/v1", "Link", l))
                    .collect::<Vec<_>>()}),
            ));
            for leaf in &leaves {
                objects.push(object("chain.example/v1", "Link", leaf, Some("ns"), json!({})));
            }
        }

        let options = TraceOptions {
            concurrency: 2,
            ..TraceOptions::default()
        };
        let builder = GraphBuilder::new(
            CountingCluster::new(objects),
            TypeResolver::new(snapshot()),
            options,
        );
        let root = builder.build("link", "", "", "root", "ns").await.unwrap();

        assert_eq!(root.node_count(), 17);
        let peak = builder.cluster.peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak in-flight requests: {}", peak);
    }

    /// Serves `objects` slowly and records the highest number of overlapping requests
    struct CountingCluster {
        objects: Vec<Value>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CountingCluster {
        fn new(objects: Vec<Value>) -> Self {
            Self {
                objects,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        async fn request(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl ClusterApi for CountingCluster {
        async fn discover(&self) -> Result<DiscoverySnapshot, TraceError> {
            Ok(snapshot())
        }

        async fn get_object(&self, target: &ObjectTarget) -> Result<Value, TraceError> {
            self.request().await;
            self.objects
                .iter()
                .find(|o| o["metadata"]["name"] == target.name.as_str())
                .cloned()
                .ok_or_else(|| TraceError::Transport("unexpected read".to_string()))
        }

        async fn list_events(&self, _query: &EventQuery) -> Result<Vec<EventRecord>, TraceError> {
            self.request().await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_connect_uses_cluster_discovery() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_discover()
            .times(1)
            .returning(|| Ok(snapshot()));

        let builder = GraphBuilder::connect(cluster, TraceOptions::default())
            .await
            .unwrap();
        assert!(builder.resolver().is_namespaced("bucket", "", "").unwrap());
    }
}
