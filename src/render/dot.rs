//! Graphviz DOT output
//!
//! Produces an undirected graph with one node per resource and an edge from
//! every parent to each child. Output paths ending in `.png` are rendered
//! through the Graphviz `dot` binary instead of being written as text.

use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};
use graphviz_rust::cmd::{CommandArg, Format, Layout};
use graphviz_rust::exec_dot;

use crate::render::Field;
use crate::trace::ResourceNode;

/// Names longer than this are shortened in node ids
const MAX_ID_NAME: usize = 24;
const ID_NAME_EDGE: usize = 12;

/// Render the tree rooted at `root` as a DOT document
pub fn render_dot(root: &ResourceNode, fields: &[Field]) -> String {
    let mut graph = DotGraph::default();
    graph.add(root, None, fields);
    graph.finish()
}

/// Whether `path` asks for a rendered image rather than DOT text
pub fn is_png_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

/// Lay out `dot` and write it to `path` as PNG
pub fn write_png(dot: &str, path: &Path) -> Result<()> {
    exec_dot(
        dot.to_string(),
        vec![
            CommandArg::Format(Format::Png),
            CommandArg::Layout(Layout::Dot),
            CommandArg::Output(path.display().to_string()),
        ],
    )
    .with_context(|| format!("Failed to render graph with graphviz: {}", path.display()))?;
    Ok(())
}

/// Node id: `Kind-name`, long names as `first12...last12`
pub fn node_id(node: &ResourceNode) -> String {
    let name = node.name();
    let chars: Vec<char> = name.chars().collect();
    let short = if chars.len() > MAX_ID_NAME {
        let head: String = chars[..ID_NAME_EDGE].iter().collect();
        let tail: String = chars[chars.len() - ID_NAME_EDGE..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        name.to_string()
    };
    format!("{}-{}", node.kind(), short)
}

/// `field: value` lines
pub fn node_label(node: &ResourceNode, parent: Option<&ResourceNode>, fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f, f.value(node, parent)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Default)]
struct DotGraph {
    nodes: Vec<String>,
    edges: Vec<String>,
    seen: HashSet<String>,
}

impl DotGraph {
    fn add(&mut self, node: &ResourceNode, parent: Option<&ResourceNode>, fields: &[Field]) {
        let id = node_id(node);
        // The same object referenced twice is drawn once
        if self.seen.insert(id.clone()) {
            self.nodes.push(format!(
                "\t{} [label={}, penwidth=2];",
                quote(&id),
                quote(&node_label(node, parent, fields))
            ));
        }

        for child in node.children() {
            self.add(child, Some(node), fields);
            self.edges
                .push(format!("\t{} -- {};", quote(&id), quote(&node_id(child))));
        }
    }

    fn finish(self) -> String {
        let mut out = String::from("graph {\n");
        for line in self.nodes.iter().chain(self.edges.iter()) {
            // Writing to a String cannot fail
            let _ = writeln!(out, "{}", line);
        }
        out.push_str("}\n");
        out
    }
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => {}
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}
