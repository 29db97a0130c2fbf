//! Data structures for resolved resource trees

use serde_json::Value;

/// Condition types consulted by the health check
pub const CONDITION_SYNCED: &str = "Synced";
pub const CONDITION_READY: &str = "Ready";

/// A node in the resolved ownership tree
///
/// The fetched object is kept as a schema-less document; conditions and
/// identity are read from it on demand. Nodes are immutable once built,
/// the builder only attaches children while constructing them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    kind: String,
    api_group: String,
    api_version: String,
    name: String,
    namespace: String,
    raw_state: Value,
    latest_event: String,
    children: Vec<ResourceNode>,
    failure: Option<BranchFailure>,
}

/// Why a child branch could not be expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFailure {
    /// Ancestry of the failed reference (`Kind/name > Kind/name`)
    pub path: String,
    /// Human readable error
    pub reason: String,
}

/// A borrowed view on one `status.conditions[]` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition<'a> {
    pub type_: &'a str,
    pub status: &'a str,
    pub reason: Option<&'a str>,
    pub message: Option<&'a str>,
}

impl ResourceNode {
    /// Build a leaf node from a fetched object document
    pub fn from_document(document: Value) -> Self {
        let api_version = str_at(&document, &["apiVersion"]).to_string();
        let api_group = api_group_of(&api_version).to_string();

        Self {
            kind: str_at(&document, &["kind"]).to_string(),
            api_group,
            api_version,
            name: str_at(&document, &["metadata", "name"]).to_string(),
            namespace: str_at(&document, &["metadata", "namespace"]).to_string(),
            raw_state: document,
            latest_event: String::new(),
            children: Vec::new(),
            failure: None,
        }
    }

    /// Build a placeholder for a reference that could not be expanded
    pub fn failed(
        kind: &str,
        api_version: &str,
        name: &str,
        namespace: &str,
        failure: BranchFailure,
    ) -> Self {
        Self {
            kind: kind.to_string(),
            api_group: api_group_of(api_version).to_string(),
            api_version: api_version.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            raw_state: Value::Null,
            latest_event: String::new(),
            children: Vec::new(),
            failure: Some(failure),
        }
    }

    /// Attach the latest event message
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.latest_event = event.into();
        self
    }

    /// Attach children in discovery order
    pub fn with_children(mut self, children: Vec<ResourceNode>) -> Self {
        self.children = children;
        self
    }

    /// Copy of this node without its children
    pub fn detached(&self) -> Self {
        Self {
            children: Vec::new(),
            ..self.clone()
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn api_group(&self) -> &str {
        &self.api_group
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Empty for cluster-scoped resources
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn raw_state(&self) -> &Value {
        &self.raw_state
    }

    pub fn latest_event(&self) -> &str {
        &self.latest_event
    }

    pub fn children(&self) -> &[ResourceNode] {
        &self.children
    }

    pub fn failure(&self) -> Option<&BranchFailure> {
        self.failure.as_ref()
    }

    /// All `status.conditions[]` entries that carry a type and a status
    pub fn conditions(&self) -> impl Iterator<Item = Condition<'_>> {
        self.raw_state
            .get("status")
            .and_then(|s| s.get("conditions"))
            .and_then(|c| c.as_array())
            .into_iter()
            .flatten()
            .filter_map(|cond| {
                Some(Condition {
                    type_: cond.get("type").and_then(|t| t.as_str())?,
                    status: cond.get("status").and_then(|s| s.as_str())?,
                    reason: cond.get("reason").and_then(|r| r.as_str()),
                    message: cond.get("message").and_then(|m| m.as_str()),
                })
            })
    }

    /// Look up a condition by type
    pub fn condition(&self, condition_type: &str) -> Option<Condition<'_>> {
        self.conditions().find(|c| c.type_ == condition_type)
    }

    /// Status of a condition (`True`, `False`, `Unknown`), `None` when absent
    pub fn condition_status(&self, condition_type: &str) -> Option<&str> {
        self.condition(condition_type).map(|c| c.status)
    }

    /// Message of the first condition that is not `True`, else the `Ready` message
    pub fn condition_message(&self) -> Option<&str> {
        self.conditions()
            .find(|c| c.status != "True" && c.message.is_some_and(|m| !m.is_empty()))
            .and_then(|c| c.message)
            .or_else(|| self.condition(CONDITION_READY).and_then(|c| c.message))
    }

    /// `Synced` or `Ready` reports `False`. A missing condition is not a failure.
    pub fn is_unhealthy(&self) -> bool {
        self.condition_status(CONDITION_SYNCED) == Some("False")
            || self.condition_status(CONDITION_READY) == Some("False")
    }

    /// Number of nodes in this subtree, including this one
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Number of levels in this subtree; a leaf has depth 1
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// `Kind/name`, used for paths and log lines
    pub fn display_id(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

/// Group part of an `apiVersion` (`s3.aws/v1` -> `s3.aws`, `v1` -> ``)
pub fn api_group_of(api_version: &str) -> &str {
    api_version
        .split_once('/')
        .map(|(group, _)| group)
        .unwrap_or("")
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> &'a str {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}
