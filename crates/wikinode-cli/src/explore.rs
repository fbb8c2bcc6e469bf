//! Non-interactive exploration: a central article plus `depth` rounds of
//! follow-up expansions

use std::collections::HashSet;

use anyhow::Result;
use futures::future::join_all;
use tracing::info;
use wikinode_core::{ArticleSource, ExpansionEngine, NodeId};

/// Nodes expanded per round when the clustering window suggests nothing
pub const FALLBACK_FANOUT: usize = 3;

/// Create the central node for `title`, then grow the graph `depth` more
/// levels. Each round expands the suggested neighbors of the previous
/// round's nodes, or their most popular unexpanded neighbors when nothing
/// is suggested. Returns the central node id.
pub async fn explore<S: ArticleSource>(
    engine: &ExpansionEngine<S>,
    title: &str,
    depth: usize,
) -> Result<NodeId> {
    let root = engine.create_central(title, None).await?.node_id();
    let mut expanded: HashSet<NodeId> = HashSet::from([root]);
    let mut frontier = vec![root];

    for level in 1..=depth {
        let next = next_round(engine, &frontier, &expanded);
        if next.is_empty() {
            info!(level, "nothing left to expand");
            break;
        }
        info!(level, nodes = next.len(), "expanding");

        let outcomes = join_all(next.iter().map(|&id| engine.expand_node(id))).await;
        for outcome in outcomes {
            outcome?;
        }
        expanded.extend(next.iter().copied());
        frontier = next;
    }

    Ok(root)
}

fn next_round<S: ArticleSource>(
    engine: &ExpansionEngine<S>,
    frontier: &[NodeId],
    expanded: &HashSet<NodeId>,
) -> Vec<NodeId> {
    let mut suggested: Vec<NodeId> = frontier
        .iter()
        .flat_map(|&center| engine.expansion_suggestions(center))
        .map(|node| node.id)
        .filter(|id| !expanded.contains(id))
        .collect();
    suggested.sort_unstable();
    suggested.dedup();
    if !suggested.is_empty() {
        return suggested;
    }

    engine.with_graph(|graph| {
        let mut neighbors: Vec<_> = frontier
            .iter()
            .flat_map(|&center| graph.neighbors(center))
            .filter(|id| !expanded.contains(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| graph.node(id))
            .collect();
        neighbors.sort_by(|a, b| b.popularity.cmp(&a.popularity).then(a.id.cmp(&b.id)));
        neighbors
            .into_iter()
            .take(FALLBACK_FANOUT)
            .map(|node| node.id)
            .collect()
    })
}
