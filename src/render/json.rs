//! JSON summary tree

use serde::Serialize;

use crate::trace::{CONDITION_READY, CONDITION_SYNCED, Finding, LineageReport, ResourceNode};

/// Serializable view of one node and its subtree
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub kind: String,
    pub api_version: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSummary>,
}

impl From<&ResourceNode> for NodeSummary {
    fn from(node: &ResourceNode) -> Self {
        Self {
            kind: node.kind().to_string(),
            api_version: node.api_version().to_string(),
            name: node.name().to_string(),
            namespace: node.namespace().to_string(),
            synced: node.condition_status(CONDITION_SYNCED).map(str::to_string),
            ready: node.condition_status(CONDITION_READY).map(str::to_string),
            message: node.condition_message().map(str::to_string),
            event: node.latest_event().to_string(),
            error: node.failure().map(|f| f.reason.clone()),
            children: node.children().iter().map(NodeSummary::from).collect(),
        }
    }
}

/// Pretty printed JSON for the tree
pub fn render_json(root: &ResourceNode) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&NodeSummary::from(root))?)
}

#[derive(Debug, Serialize)]
struct LineageEntry {
    path: String,
    #[serde(flatten)]
    node: NodeSummary,
}

#[derive(Debug, Serialize)]
struct LineageSummary {
    unhealthy: Vec<LineageEntry>,
    unresolved: Vec<LineageEntry>,
}

/// Pretty printed JSON for a lineage report; nodes are listed without children
pub fn render_lineage_json(report: &LineageReport<'_>) -> anyhow::Result<String> {
    fn entries(findings: &[Finding<'_>]) -> Vec<LineageEntry> {
        findings
            .iter()
            .map(|f| LineageEntry {
                path: f.path(),
                node: NodeSummary::from(&f.node.detached()),
            })
            .collect()
    }

    let summary = LineageSummary {
        unhealthy: entries(&report.unhealthy),
        unresolved: entries(&report.unresolved),
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}
