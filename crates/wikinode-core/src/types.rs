//! Common types used across wikinode

use serde::{Deserialize, Serialize};

/// Sequential node identifier assigned by the graph store
pub type NodeId = u64;

/// Sequential edge identifier assigned by the graph store
pub type EdgeId = u64;

/// Wikipedia page identifier
pub type PageId = u64;

/// An article placed on the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Article title as displayed. Uniqueness is case-insensitive.
    pub label: String,
    /// Pageviews, or the link count when no pageviews were reported.
    pub popularity: u64,
    #[serde(default)]
    pub link_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<PageId>,
    /// Node whose expansion created this one; `None` for a central node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub size: f64,
    /// `None` when color-coding is off; the renderer picks its theme default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Node {
    /// Central nodes are the roots a session's graph is built around
    pub fn is_central(&self) -> bool {
        self.parent.is_none()
    }

    /// Lowercased label used for uniqueness checks
    pub fn normalized_label(&self) -> String {
        normalize_title(&self.label)
    }
}

/// Attributes supplied by callers when creating a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewNode {
    pub label: String,
    pub popularity: u64,
    pub link_count: u64,
    pub page_id: Option<PageId>,
    pub parent: Option<NodeId>,
}

impl NewNode {
    pub fn new(label: impl Into<String>, popularity: u64) -> Self {
        Self {
            label: label.into(),
            popularity,
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_page_id(mut self, page_id: Option<PageId>) -> Self {
        self.page_id = page_id;
        self
    }

    pub fn with_link_count(mut self, link_count: u64) -> Self {
        self.link_count = link_count;
        self
    }
}

/// Directed relation: expanding `from` surfaced `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    /// Whether this edge joins `a` and `b`, in either direction
    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }

    /// The endpoint opposite `node`, if this edge touches it
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if self.from == node {
            Some(self.to)
        } else if self.to == node {
            Some(self.from)
        } else {
            None
        }
    }
}

/// A complete copy of the graph, as handed to renderers and importers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// A search hit returned by an [`ArticleSource`](crate::source::ArticleSource)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedArticle {
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

impl RelatedArticle {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: String::new(),
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }
}

/// Lowercase form used for every case-insensitive title comparison
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Titles that never become candidates: project namespaces and citation noise
pub fn is_excluded_title(title: &str) -> bool {
    const EXCLUDED_PREFIXES: &[&str] = &[
        "help:",
        "special:",
        "user:",
        "wikipedia:",
        "category:",
        "template:",
        "template talk:",
        "file:",
        "portal:",
    ];
    const EXCLUDED_FRAGMENTS: &[&str] = &["citation needed", "isbn"];

    let lower = normalize_title(title);
    lower.is_empty()
        || EXCLUDED_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
        || EXCLUDED_FRAGMENTS.iter().any(|fragment| lower.contains(fragment))
}
