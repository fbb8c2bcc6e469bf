//! In-memory article graph with uniqueness invariants and derived styling

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphError;
use crate::types::{Edge, EdgeId, GraphSnapshot, NewNode, Node, NodeId, PageId, normalize_title};

pub const MIN_NODE_SIZE: f64 = 12.0;
pub const MAX_NODE_SIZE: f64 = 30.0;

/// Pageview counts at or below this map to 0 on the log scale
pub const LOG_SCALE_FLOOR: f64 = 3_000.0;
/// Pageview counts at or above this map to 1 on the log scale
pub const LOG_SCALE_CEILING: f64 = 10_000_000.0;

/// How popularity is mapped to the `[0, 1]` ratio driving size and color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    /// Relative to the most popular node currently in the graph
    #[default]
    Linear,
    /// Absolute log10 scale between [`LOG_SCALE_FLOOR`] and [`LOG_SCALE_CEILING`]
    Logarithmic,
}

/// The node/edge set of one exploration session.
///
/// Every operation is synchronous and visible to the next call. Node and
/// edge ids come from counters that never rewind, so ids removed by undo are
/// never handed out again.
#[derive(Debug, Clone)]
pub struct GraphStore {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    next_node_id: NodeId,
    next_edge_id: EdgeId,
    colorize: bool,
    scale: ScaleMode,
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            next_node_id: 1,
            next_edge_id: 1,
            colorize: false,
            scale: ScaleMode::Linear,
        }
    }

    pub fn with_style(colorize: bool, scale: ScaleMode) -> Self {
        Self {
            colorize,
            scale,
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in id order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Case-insensitive lookup by label.
    ///
    /// A linear scan; graphs hold hundreds of nodes. Every label lookup goes
    /// through here so an index can replace it without touching callers.
    pub fn find_node_by_label(&self, label: &str) -> Option<&Node> {
        let wanted = normalize_title(label);
        self.nodes
            .values()
            .find(|node| node.normalized_label() == wanted)
    }

    /// Create a node with the next sequential id.
    ///
    /// Callers check [`find_node_by_label`](Self::find_node_by_label) first; a
    /// duplicate label here is a bug and is reported as such.
    pub fn add_node(&mut self, new: NewNode) -> Result<NodeId, GraphError> {
        if self.find_node_by_label(&new.label).is_some() {
            return Err(GraphError::DuplicateLabel(new.label));
        }
        if let Some(parent) = new.parent {
            if !self.contains_node(parent) {
                return Err(GraphError::UnknownNode(parent));
            }
        }

        let id = self.next_node_id;
        self.next_node_id = id.checked_add(1).ok_or(GraphError::IdExhausted)?;
        self.nodes.insert(
            id,
            Node {
                id,
                label: new.label,
                popularity: new.popularity,
                link_count: new.link_count,
                page_id: new.page_id,
                parent: new.parent,
                size: MIN_NODE_SIZE,
                color: None,
            },
        );
        Ok(id)
    }

    pub fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.edges.values().any(|edge| edge.connects(a, b))
    }

    /// Connect `from → to` unless the pair is already joined in either
    /// direction. Self-loops are never created.
    pub fn add_edge_if_absent(
        &mut self,
        from: NodeId,
        to: NodeId,
    ) -> Result<Option<Edge>, GraphError> {
        for endpoint in [from, to] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::UnknownNode(endpoint));
            }
        }
        if from == to || self.are_connected(from, to) {
            return Ok(None);
        }

        let edge = Edge {
            id: self.next_edge_id,
            from,
            to,
        };
        self.next_edge_id = edge.id.checked_add(1).ok_or(GraphError::IdExhausted)?;
        self.edges.insert(edge.id, edge);
        Ok(Some(edge))
    }

    /// Raise a node's popularity; lower or equal values are ignored.
    pub fn bump_popularity_if_higher(&mut self, id: NodeId, popularity: u64) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) if popularity > node.popularity => {
                debug!(
                    node = id,
                    from = node.popularity,
                    to = popularity,
                    "raised popularity"
                );
                node.popularity = popularity;
                true
            }
            _ => false,
        }
    }

    /// Record a page id for a node that does not have one yet
    pub fn set_page_id_if_missing(&mut self, id: NodeId, page_id: PageId) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) if node.page_id.is_none() => {
                node.page_id = Some(page_id);
                true
            }
            _ => false,
        }
    }

    pub fn colorize(&self) -> bool {
        self.colorize
    }

    pub fn scale(&self) -> ScaleMode {
        self.scale
    }

    /// Toggle color-coding and refresh every node's color
    pub fn set_colorize(&mut self, enabled: bool) {
        self.colorize = enabled;
        self.recompute_derived_attributes();
    }

    pub fn set_scale(&mut self, scale: ScaleMode) {
        self.scale = scale;
        self.recompute_derived_attributes();
    }

    /// Recalculate every node's size and color from the current popularities.
    ///
    /// Sizes are relative to the global maximum, so this runs after any
    /// popularity change, not just for the node that changed.
    pub fn recompute_derived_attributes(&mut self) {
        let max_popularity = self
            .nodes
            .values()
            .map(|node| node.popularity)
            .max()
            .unwrap_or(0);

        for node in self.nodes.values_mut() {
            let ratio = popularity_ratio(self.scale, node.popularity, max_popularity);
            node.size = if node.is_central() {
                MAX_NODE_SIZE
            } else {
                MIN_NODE_SIZE + ratio * (MAX_NODE_SIZE - MIN_NODE_SIZE)
            };
            node.color = self.colorize.then(|| node_color(ratio));
        }
    }

    /// Remove an edge by id
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        self.edges.remove(&id)
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.edges.retain(|_, edge| !edge.touches(id));
        Some(node)
    }

    /// Re-insert a node under its original id.
    ///
    /// The id counter moves past the restored id so it is never reissued.
    pub fn restore_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::NodeIdInUse(node.id));
        }
        if self.find_node_by_label(&node.label).is_some() {
            return Err(GraphError::DuplicateLabel(node.label));
        }
        let after = node.id.checked_add(1).ok_or(GraphError::IdExhausted)?;
        self.next_node_id = self.next_node_id.max(after);
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Re-insert an edge under its original id
    pub fn restore_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if self.edges.contains_key(&edge.id) {
            return Err(GraphError::EdgeIdInUse(edge.id));
        }
        for endpoint in [edge.from, edge.to] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::DanglingEdge {
                    edge: edge.id,
                    node: endpoint,
                });
            }
        }
        if edge.from == edge.to || self.are_connected(edge.from, edge.to) {
            return Err(GraphError::DuplicateEdge {
                from: edge.from,
                to: edge.to,
            });
        }
        let after = edge.id.checked_add(1).ok_or(GraphError::IdExhausted)?;
        self.next_edge_id = self.next_edge_id.max(after);
        self.edges.insert(edge.id, edge);
        Ok(())
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().copied().collect(),
        }
    }

    /// Replace the whole graph with imported data.
    ///
    /// The import is validated against the same invariants as live mutations;
    /// on error the current graph is left untouched.
    pub fn load_snapshot(&mut self, snapshot: GraphSnapshot) -> Result<(), GraphError> {
        let mut staged = Self::with_style(self.colorize, self.scale);
        for node in snapshot.nodes {
            staged.restore_node(node)?;
        }
        for edge in snapshot.edges {
            staged.restore_edge(edge)?;
        }
        staged.recompute_derived_attributes();
        *self = staged;
        Ok(())
    }

    /// Ids of every node sharing an edge with `id`
    pub fn neighbors(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.edges
            .values()
            .filter_map(|edge| edge.other(id))
            .collect()
    }

    /// Local clustering coefficient of a node within the graph.
    ///
    /// 0 when the node has fewer than two neighbors.
    pub fn clustering_coefficient(&self, id: NodeId) -> f64 {
        let neighbors: Vec<NodeId> = self.neighbors(id).into_iter().collect();
        let k = neighbors.len();
        if k < 2 {
            return 0.0;
        }

        let mut linked_pairs = 0usize;
        for (i, &a) in neighbors.iter().enumerate() {
            for &b in &neighbors[i + 1..] {
                if self.are_connected(a, b) {
                    linked_pairs += 1;
                }
            }
        }

        let possible = k * (k - 1) / 2;
        linked_pairs as f64 / possible as f64
    }

    /// First-layer neighbors of `center` whose clustering coefficient lies in
    /// `[min_lcc, max_lcc]`: embedded in the graph, but not redundant.
    pub fn expansion_suggestions(&self, center: NodeId, min_lcc: f64, max_lcc: f64) -> Vec<&Node> {
        self.neighbors(center)
            .into_iter()
            .filter(|&id| {
                let coefficient = self.clustering_coefficient(id);
                coefficient >= min_lcc && coefficient <= max_lcc
            })
            .filter_map(|id| self.node(id))
            .collect()
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Map popularity to `[0, 1]` according to the scale mode
pub fn popularity_ratio(scale: ScaleMode, popularity: u64, max_popularity: u64) -> f64 {
    match scale {
        ScaleMode::Linear if max_popularity == 0 => 0.0,
        ScaleMode::Linear => popularity as f64 / max_popularity as f64,
        ScaleMode::Logarithmic => log_normalize(popularity),
    }
}

/// Position of `views` on a log10 scale between the floor and the ceiling,
/// clamped to `[0, 1]`
pub fn log_normalize(views: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    let low = LOG_SCALE_FLOOR.log10();
    let high = LOG_SCALE_CEILING.log10();
    (((views as f64).log10() - low) / (high - low)).clamp(0.0, 1.0)
}

/// Blue (hue 240) for the least popular through red (hue 360) for the most
pub fn node_color(ratio: f64) -> String {
    let ratio = (ratio.clamp(0.0, 1.0) * 100.0).round() / 100.0;
    let hue = (240.0 + ratio * 120.0).round() as u32;
    format!("hsl({hue}, 70%, 50%)")
}
