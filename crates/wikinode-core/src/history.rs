//! Undo/redo log of graph expansions

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphError;
use crate::graph::GraphStore;
use crate::types::{Edge, Node, NodeId};

/// The entities created by one expansion, kept so the expansion can be
/// reverted and re-applied with the same ids.
///
/// Nodes that already existed and only had their popularity raised are not
/// part of the command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionCommand {
    pub parent_node_id: NodeId,
    pub added_nodes: Vec<Node>,
    pub added_edges: Vec<Edge>,
}

impl ExpansionCommand {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty() && self.added_edges.is_empty()
    }

    /// Re-insert the recorded nodes and edges under their original ids.
    ///
    /// All-or-nothing: if any entity conflicts with the current graph, the
    /// graph is left as it was.
    pub fn apply(&self, graph: &mut GraphStore) -> Result<(), GraphError> {
        let mut staged = graph.clone();
        for node in &self.added_nodes {
            staged.restore_node(node.clone())?;
        }
        for edge in &self.added_edges {
            staged.restore_edge(*edge)?;
        }
        staged.recompute_derived_attributes();
        *graph = staged;
        Ok(())
    }

    /// Remove exactly the recorded nodes and edges
    pub fn revert(&self, graph: &mut GraphStore) {
        for edge in &self.added_edges {
            graph.remove_edge(edge.id);
        }
        for node in &self.added_nodes {
            graph.remove_node(node.id);
        }
        graph.recompute_derived_attributes();
    }
}

/// Linear undo history: recording a new command discards anything that
/// could have been redone.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    undo_stack: Vec<ExpansionCommand>,
    redo_stack: Vec<ExpansionCommand>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, command: ExpansionCommand) {
        debug!(
            parent = command.parent_node_id,
            nodes = command.added_nodes.len(),
            edges = command.added_edges.len(),
            "recorded expansion"
        );
        self.undo_stack.push(command);
        self.redo_stack.clear();
    }

    /// Revert the most recent command. Returns `false` when there is nothing
    /// to undo.
    pub fn undo(&mut self, graph: &mut GraphStore) -> bool {
        let Some(command) = self.undo_stack.pop() else {
            return false;
        };
        command.revert(graph);
        self.redo_stack.push(command);
        true
    }

    /// Re-apply the most recently undone command. Returns `Ok(false)` when
    /// there is nothing to redo. A command that no longer fits the graph
    /// stays on the redo stack.
    pub fn redo(&mut self, graph: &mut GraphStore) -> Result<bool, GraphError> {
        let Some(command) = self.redo_stack.pop() else {
            return Ok(false);
        };
        if let Err(err) = command.apply(graph) {
            self.redo_stack.push(command);
            return Err(err);
        }
        self.undo_stack.push(command);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
