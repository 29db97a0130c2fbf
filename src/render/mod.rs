//! Output renderers for resource trees
//!
//! Every renderer walks the tree in pre-order and reads node data through a
//! selectable list of [`Field`]s.

pub mod dot;
pub mod json;
pub mod table;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::trace::{CONDITION_READY, CONDITION_SYNCED, ResourceNode};

/// Output formats understood by `describe` and `diagnose`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned text table
    #[default]
    Cli,
    /// Graphviz DOT
    Graph,
    /// JSON summary tree
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Cli => "cli",
            OutputFormat::Graph => "graph",
            OutputFormat::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cli" => Ok(OutputFormat::Cli),
            "graph" => Ok(OutputFormat::Graph),
            "json" => Ok(OutputFormat::Json),
            other => Err(anyhow::anyhow!(
                "Unknown output format '{}', expected cli, graph or json",
                other
            )),
        }
    }
}

/// A column of the table or a line of a graph label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Parent,
    Name,
    Kind,
    Namespace,
    ApiVersion,
    Synced,
    Ready,
    Message,
    Event,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Parent,
        Field::Name,
        Field::Kind,
        Field::Namespace,
        Field::ApiVersion,
        Field::Synced,
        Field::Ready,
        Field::Message,
        Field::Event,
    ];

    /// Lower-case name as accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Parent => "parent",
            Field::Name => "name",
            Field::Kind => "kind",
            Field::Namespace => "namespace",
            Field::ApiVersion => "apiversion",
            Field::Synced => "synced",
            Field::Ready => "ready",
            Field::Message => "message",
            Field::Event => "event",
        }
    }

    /// Table header
    pub fn header(&self) -> &'static str {
        match self {
            Field::ApiVersion => "API VERSION",
            Field::Parent => "PARENT",
            Field::Name => "NAME",
            Field::Kind => "KIND",
            Field::Namespace => "NAMESPACE",
            Field::Synced => "SYNCED",
            Field::Ready => "READY",
            Field::Message => "MESSAGE",
            Field::Event => "EVENT",
        }
    }

    /// Value of this field for `node`; `parent` is the node's parent, if any
    pub fn value(&self, node: &ResourceNode, parent: Option<&ResourceNode>) -> String {
        match self {
            Field::Parent => parent.map(|p| p.kind().to_string()).unwrap_or_default(),
            Field::Name => node.name().to_string(),
            Field::Kind => node.kind().to_string(),
            Field::Namespace => node.namespace().to_string(),
            Field::ApiVersion => node.api_version().to_string(),
            Field::Synced => node
                .condition_status(CONDITION_SYNCED)
                .unwrap_or_default()
                .to_string(),
            Field::Ready => node
                .condition_status(CONDITION_READY)
                .unwrap_or_default()
                .to_string(),
            // Failed nodes have no conditions, their error is the message
            Field::Message => match node.failure() {
                Some(failure) => failure.reason.clone(),
                None => node.condition_message().unwrap_or_default().to_string(),
            },
            Field::Event => node.latest_event().to_string(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Field::ALL.iter().map(|f| f.as_str()).collect();
                anyhow::anyhow!(
                    "Unknown field '{}', allowed fields are: {}",
                    s,
                    allowed.join(", ")
                )
            })
    }
}

/// Parse a list of field names, failing on the first unknown one
pub fn parse_fields<S: AsRef<str>>(names: &[S]) -> anyhow::Result<Vec<Field>> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}

/// Default columns for `describe`
pub fn default_describe_fields() -> Vec<Field> {
    vec![
        Field::Parent,
        Field::Kind,
        Field::Name,
        Field::Namespace,
        Field::Synced,
        Field::Ready,
    ]
}

/// Default columns for `diagnose`
pub fn default_diagnose_fields() -> Vec<Field> {
    vec![
        Field::Kind,
        Field::ApiVersion,
        Field::Name,
        Field::Synced,
        Field::Ready,
        Field::Message,
        Field::Event,
    ]
}

/// Visit every node in pre-order together with its parent
pub(crate) fn walk<'a>(
    node: &'a ResourceNode,
    parent: Option<&'a ResourceNode>,
    visit: &mut dyn FnMut(&'a ResourceNode, Option<&'a ResourceNode>),
) {
    visit(node, parent);
    for child in node.children() {
        walk(child, Some(node), visit);
    }
}
