//! Terminal, JSON and Mermaid renderings of a graph snapshot

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as FmtWrite;

use anyhow::Result;
use clap::ValueEnum;
use wikinode_core::{ExpansionCommand, GraphSnapshot, Node, NodeId};

const DIVIDER: &str = "─────────────────────────────────────────────────────────────";
const LABEL_WIDTH: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented article tree with summary
    #[default]
    Text,
    /// Pretty-printed snapshot, loadable with `render` and `shell --import`
    Json,
    /// Mermaid flowchart
    Mermaid,
}

pub fn render(snapshot: &GraphSnapshot, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => render_text(snapshot),
        OutputFormat::Json => serde_json::to_string_pretty(snapshot)?,
        OutputFormat::Mermaid => graph_to_mermaid(snapshot),
    })
}

fn push_section_header(buf: &mut String, icon: &str, title: &str) {
    let _ = writeln!(buf, "{DIVIDER}");
    let _ = writeln!(buf, "{icon} {title}");
    let _ = writeln!(buf, "{DIVIDER}");
}

fn push_key_value(buf: &mut String, label: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let _ = writeln!(buf, "• {:<width$} : {}", label, value, width = LABEL_WIDTH);
}

pub fn render_text(snapshot: &GraphSnapshot) -> String {
    let mut buf = String::new();
    if snapshot.is_empty() {
        push_section_header(&mut buf, "🌐", "Empty graph");
        return buf;
    }

    let ids: HashSet<NodeId> = snapshot.nodes.iter().map(|node| node.id).collect();
    let mut children: BTreeMap<NodeId, Vec<&Node>> = BTreeMap::new();
    let mut roots = Vec::new();
    for node in &snapshot.nodes {
        match node.parent.filter(|parent| ids.contains(parent)) {
            Some(parent) => children.entry(parent).or_default().push(node),
            None => roots.push(node),
        }
    }

    let title = roots
        .iter()
        .map(|node| node.label.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    push_section_header(&mut buf, "🌐", &title);
    push_key_value(&mut buf, "Articles", &snapshot.nodes.len().to_string());
    push_key_value(&mut buf, "Links", &snapshot.edges.len().to_string());
    if let Some(top) = snapshot.nodes.iter().max_by_key(|node| node.popularity) {
        push_key_value(
            &mut buf,
            "Most viewed",
            &format!("{} ({})", top.label, format_count(top.popularity)),
        );
    }
    buf.push('\n');

    push_section_header(&mut buf, "🧭", "Articles");
    for root in &roots {
        push_subtree(&mut buf, root, &children, 0);
    }

    let cross_links: Vec<String> = snapshot
        .edges
        .iter()
        .filter(|edge| {
            snapshot
                .node(edge.to)
                .is_some_and(|node| node.parent != Some(edge.from))
        })
        .filter_map(|edge| {
            let from = snapshot.node(edge.from)?;
            let to = snapshot.node(edge.to)?;
            Some(format!("{} → {}", from.label, to.label))
        })
        .collect();
    if !cross_links.is_empty() {
        buf.push('\n');
        push_section_header(&mut buf, "🔗", "Cross links");
        for link in cross_links {
            let _ = writeln!(buf, "  {link}");
        }
    }

    buf
}

fn push_subtree(
    buf: &mut String,
    node: &Node,
    children: &BTreeMap<NodeId, Vec<&Node>>,
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    let marker = if depth == 0 { "◉" } else { "└─" };
    let _ = writeln!(
        buf,
        "{indent}{marker} [{id}] {label}  ({views} views, size {size:.1})",
        id = node.id,
        label = node.label,
        views = format_count(node.popularity),
        size = node.size,
    );
    for child in children.get(&node.id).into_iter().flatten() {
        push_subtree(buf, child, children, depth + 1);
    }
}

pub fn graph_to_mermaid(snapshot: &GraphSnapshot) -> String {
    if snapshot.is_empty() {
        return "graph TD\n  Empty[\"No data\"]".to_string();
    }

    let mut lines = Vec::new();
    lines.push("graph TD".to_string());

    for node in &snapshot.nodes {
        lines.push(format!(
            "  N{id}[\"{label}\"]",
            id = node.id,
            label = escape_mermaid_label(&node.label)
        ));
    }

    for edge in &snapshot.edges {
        lines.push(format!("  N{} --> N{}", edge.from, edge.to));
    }

    for node in &snapshot.nodes {
        if let Some(color) = &node.color {
            lines.push(format!("  style N{} fill:{}", node.id, color.replace(' ', "")));
        }
    }

    lines.join("\n")
}

fn escape_mermaid_label(label: &str) -> String {
    label.replace('"', "#quot;")
}

/// One-line summary of an applied expansion
pub fn describe_command(command: &ExpansionCommand) -> String {
    let labels: Vec<&str> = command
        .added_nodes
        .iter()
        .map(|node| node.label.as_str())
        .collect();
    let mut line = format!(
        "added {} article(s), {} link(s)",
        command.added_nodes.len(),
        command.added_edges.len()
    );
    if !labels.is_empty() {
        let _ = write!(line, ": {}", labels.join(", "));
    }
    line
}

pub fn render_suggestions(center: &Node, suggestions: &[Node]) -> String {
    let mut buf = String::new();
    push_section_header(&mut buf, "💡", &format!("Expand next from {}", center.label));
    if suggestions.is_empty() {
        let _ = writeln!(buf, "  (no neighbors in the clustering window)");
    }
    for node in suggestions {
        let _ = writeln!(buf, "  [{}] {}", node.id, node.label);
    }
    buf
}

pub fn render_trending(titles: &[String]) -> String {
    let mut buf = String::new();
    push_section_header(&mut buf, "🔥", "Trending yesterday");
    for (rank, title) in titles.iter().enumerate() {
        let _ = writeln!(buf, "{:>3}. {}", rank + 1, title);
    }
    buf
}

/// `1234567` → `1,234,567`
fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikinode_core::{GraphStore, NewNode};

    fn sample() -> GraphSnapshot {
        let mut graph = GraphStore::new();
        let rust = graph.add_node(NewNode::new("Rust", 1_250_000)).unwrap();
        let cargo = graph
            .add_node(NewNode::new("Cargo", 40_000).with_parent(rust))
            .unwrap();
        let llvm = graph
            .add_node(NewNode::new("LLVM \"compiler\"", 90_000).with_parent(rust))
            .unwrap();
        graph.add_edge_if_absent(rust, cargo).unwrap();
        graph.add_edge_if_absent(rust, llvm).unwrap();
        graph.add_edge_if_absent(cargo, llvm).unwrap();
        graph.recompute_derived_attributes();
        graph.snapshot()
    }

    #[test]
    fn test_text_lists_articles_as_a_tree() {
        let text = render_text(&sample());
        assert!(text.contains("🌐 Rust"));
        assert!(text.contains("• Articles         : 3"));
        assert!(text.contains("◉ [1] Rust  (1,250,000 views, size 30.0)"));
        assert!(text.contains("  └─ [2] Cargo"));
        assert!(text.contains("Cargo → LLVM \"compiler\""));
    }

    #[test]
    fn test_mermaid_escapes_quotes_and_lists_edges() {
        let mermaid = graph_to_mermaid(&sample());
        assert!(mermaid.starts_with("graph TD"));
        assert!(mermaid.contains("N3[\"LLVM #quot;compiler#quot;\"]"));
        assert!(mermaid.contains("N1 --> N2"));
        assert!(mermaid.contains("N2 --> N3"));
        assert!(!mermaid.contains("style"));
    }

    #[test]
    fn test_mermaid_styles_colored_nodes() {
        let mut graph = GraphStore::new();
        graph.set_colorize(true);
        graph.add_node(NewNode::new("Rust", 10)).unwrap();
        graph.recompute_derived_attributes();
        let mermaid = graph_to_mermaid(&graph.snapshot());
        assert!(mermaid.contains("style N1 fill:hsl("));
    }

    #[test]
    fn test_empty_graph_renders_placeholders() {
        let empty = GraphSnapshot::default();
        assert!(render_text(&empty).contains("Empty graph"));
        assert_eq!(graph_to_mermaid(&empty), "graph TD\n  Empty[\"No data\"]");
    }

    #[test]
    fn test_json_output_parses_back() {
        let json = render(&sample(), OutputFormat::Json).unwrap();
        let parsed: GraphSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_format_count_groups_thousands() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_250_000), "1,250,000");
    }
}
