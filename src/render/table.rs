//! Aligned text table, one row per node

use crate::render::{Field, walk};
use crate::trace::{LineageReport, ResourceNode};

/// Column separator
const GAP: &str = "   ";

/// Render `root` and all descendants as a table
///
/// Rows follow pre-order. Cells are left aligned and padded to the widest
/// value of their column; the last column is not padded.
pub fn render_table(root: &ResourceNode, fields: &[Field]) -> String {
    let mut rows: Vec<Vec<String>> = vec![fields.iter().map(|f| f.header().to_string()).collect()];
    walk(root, None, &mut |node, parent| {
        rows.push(fields.iter().map(|f| one_line(&f.value(node, parent))).collect());
    });

    layout(rows)
}

/// Unhealthy nodes with their ancestry, then unresolved references
pub fn render_lineage_table(report: &LineageReport<'_>, fields: &[Field]) -> String {
    let mut rows: Vec<Vec<String>> = vec![
        std::iter::once("PATH".to_string())
            .chain(fields.iter().map(|f| f.header().to_string()))
            .collect(),
    ];
    for finding in &report.unhealthy {
        let parent = finding.ancestors.last().copied();
        rows.push(
            std::iter::once(finding.path())
                .chain(fields.iter().map(|f| one_line(&f.value(finding.node, parent))))
                .collect(),
        );
    }

    let mut out = if report.unhealthy.is_empty() {
        String::new()
    } else {
        layout(rows)
    };

    if !report.unresolved.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("Unresolved references:\n");
        for finding in &report.unresolved {
            let reason = finding.node.failure().map(|f| f.reason.as_str()).unwrap_or_default();
            out.push_str(&format!("  {}: {}\n", finding.path(), one_line(reason)));
        }
    }
    out
}

fn layout(rows: Vec<Vec<String>>) -> String {
    let columns = rows.first().map(Vec::len).unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|col| rows.iter().map(|r| r[col].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in rows {
        let mut line = String::new();
        for (col, cell) in row.iter().enumerate() {
            if col + 1 == row.len() {
                line.push_str(cell);
            } else {
                line.push_str(&format!("{:<width$}", cell, width = widths[col]));
                line.push_str(GAP);
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Condition messages may span lines; keep one row per node
fn one_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
