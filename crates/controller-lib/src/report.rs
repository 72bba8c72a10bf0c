//! Per-node cluster report, as JSON rows or CSV

use serde::Serialize;

use crate::models::{Node, NodeId, NodeStatus, NodeType};

const CSV_HEADER: [&str; 9] = [
    "Node ID",
    "CPU Total",
    "CPU Available",
    "Memory Total (GB)",
    "Memory Available (GB)",
    "Status",
    "Node Type",
    "Network Group",
    "Pods",
];

/// One node's row in the cluster report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub node_id: NodeId,
    pub cpu_total: u32,
    pub cpu_available: u32,
    pub memory_total: u32,
    pub memory_available: u32,
    pub status: NodeStatus,
    pub node_type: NodeType,
    pub network_group: String,
    /// `pod-N (CPU:c, Mem:m)` entries joined by `; `
    pub pods: String,
}

impl From<&Node> for ReportRow {
    fn from(node: &Node) -> Self {
        let pods = node
            .pods
            .iter()
            .map(|p| format!("{} (CPU:{}, Mem:{})", p.name(), p.cpu, p.memory))
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            node_id: node.node_id,
            cpu_total: node.cpu_total,
            cpu_available: node.cpu_available,
            memory_total: node.memory_total,
            memory_available: node.memory_available,
            status: node.status,
            node_type: node.node_type,
            network_group: node.network_group.clone(),
            pods,
        }
    }
}

pub fn build_report(nodes: &[Node]) -> Vec<ReportRow> {
    nodes.iter().map(ReportRow::from).collect()
}

/// Render rows as CSV with a header line
pub fn render_csv(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    push_record(&mut out, CSV_HEADER.iter().map(|h| h.to_string()));

    for row in rows {
        push_record(
            &mut out,
            [
                row.node_id.to_string(),
                row.cpu_total.to_string(),
                row.cpu_available.to_string(),
                row.memory_total.to_string(),
                row.memory_available.to_string(),
                row.status.to_string(),
                row.node_type.to_string(),
                row.network_group.clone(),
                row.pods.clone(),
            ],
        );
    }
    out
}

fn push_record(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let line = fields
        .into_iter()
        .map(|f| escape_field(&f))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

/// Quote a field if it contains a delimiter, quote or line break
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeSpec, Pod, PodSpec};
    use crate::clock::Stamp;

    #[test]
    fn test_empty_report_is_header_only() {
        let csv = render_csv(&[]);
        assert_eq!(
            csv,
            "Node ID,CPU Total,CPU Available,Memory Total (GB),Memory Available (GB),Status,Node Type,Network Group,Pods\r\n"
        );
    }

    #[test]
    fn test_row_lists_pods() {
        let mut node = Node::new(NodeSpec::new(8, 16).unwrap(), Stamp::now());
        node.assign(Pod::from_spec(1, PodSpec::new(2, 4).unwrap()));
        node.assign(Pod::from_spec(2, PodSpec::new(1, 1).unwrap()));

        let rows = build_report(std::slice::from_ref(&node));
        assert_eq!(rows[0].pods, "pod-1 (CPU:2, Mem:4); pod-2 (CPU:1, Mem:1)");
        assert_eq!(rows[0].cpu_available, 5);

        let csv = render_csv(&rows);
        let line = csv.lines().nth(1).unwrap();
        assert!(line.starts_with(&node.node_id.to_string()));
        assert!(line.ends_with("\"pod-1 (CPU:2, Mem:4); pod-2 (CPU:1, Mem:1)\""));
        assert!(line.contains(",active,balanced,default,"));
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
