//! Health diagnosis over a built tree
//!
//! Pure in-memory passes, nothing here talks to the cluster.

use crate::trace::models::ResourceNode;

/// Result of [`diagnose`]
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnosis {
    /// Every node reported healthy (or carried no conditions)
    NoFindings,
    /// First unhealthy node, later ones attached as its direct children
    Unhealthy(ResourceNode),
}

impl Diagnosis {
    pub fn is_empty(&self) -> bool {
        matches!(self, Diagnosis::NoFindings)
    }

    pub fn tree(&self) -> Option<&ResourceNode> {
        match self {
            Diagnosis::NoFindings => None,
            Diagnosis::Unhealthy(root) => Some(root),
        }
    }

    pub fn into_tree(self) -> Option<ResourceNode> {
        match self {
            Diagnosis::NoFindings => None,
            Diagnosis::Unhealthy(root) => Some(root),
        }
    }
}

/// Collect unhealthy nodes into a one-level report
///
/// Nodes are visited in pre-order. The first unhealthy node becomes the
/// report root; every later one is appended to it as a direct child,
/// whatever its real ancestry. Nodes are copied without their children.
pub fn diagnose(root: &ResourceNode) -> Diagnosis {
    let mut unhealthy = Vec::new();
    collect_unhealthy(root, &mut unhealthy);

    let mut found = unhealthy.into_iter();
    match found.next() {
        None => Diagnosis::NoFindings,
        Some(first) => {
            let rest: Vec<ResourceNode> = found.map(ResourceNode::detached).collect();
            tracing::debug!(
                "Diagnosis promoted {} with {} more unhealthy resources",
                first.display_id(),
                rest.len()
            );
            Diagnosis::Unhealthy(first.detached().with_children(rest))
        }
    }
}

fn collect_unhealthy<'a>(node: &'a ResourceNode, out: &mut Vec<&'a ResourceNode>) {
    if node.is_unhealthy() {
        out.push(node);
    }
    for child in node.children() {
        collect_unhealthy(child, out);
    }
}

/// An unhealthy or unresolved node together with its real ancestry
#[derive(Debug, Clone, PartialEq)]
pub struct Finding<'a> {
    pub node: &'a ResourceNode,
    /// Ancestors from the tree root down to the direct parent
    pub ancestors: Vec<&'a ResourceNode>,
}

impl Finding<'_> {
    /// `Kind/name > Kind/name`, ending with the node itself
    pub fn path(&self) -> String {
        self.ancestors
            .iter()
            .chain(std::iter::once(&self.node))
            .map(|n| n.display_id())
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

/// Report that keeps each finding's lineage instead of flattening it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineageReport<'a> {
    /// Nodes whose `Synced` or `Ready` condition is `False`, pre-order
    pub unhealthy: Vec<Finding<'a>>,
    /// Child references that could not be expanded, pre-order
    pub unresolved: Vec<Finding<'a>>,
}

impl LineageReport<'_> {
    pub fn is_empty(&self) -> bool {
        self.unhealthy.is_empty() && self.unresolved.is_empty()
    }
}

/// Every unhealthy node with its true ancestor path
pub fn unhealthy_with_lineage(root: &ResourceNode) -> LineageReport<'_> {
    let mut report = LineageReport::default();
    let mut ancestors = Vec::new();
    walk_lineage(root, &mut ancestors, &mut report);
    report
}

fn walk_lineage<'a>(
    node: &'a ResourceNode,
    ancestors: &mut Vec<&'a ResourceNode>,
    report: &mut LineageReport<'a>,
) {
    let finding = || Finding {
        node,
        ancestors: ancestors.clone(),
    };

    if node.failure().is_some() {
        report.unresolved.push(finding());
    } else if node.is_unhealthy() {
        report.unhealthy.push(finding());
    }

    ancestors.push(node);
    for child in node.children() {
        walk_lineage(child, ancestors, report);
    }
    ancestors.pop();
}
