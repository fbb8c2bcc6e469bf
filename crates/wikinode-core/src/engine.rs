//! Graph growth: discover, rank, diff and record expansions
//!
//! The engine owns the session state (graph, undo history, the set of nodes
//! currently expanding and the trending titles) behind a single mutex. The
//! lock is only ever taken for synchronous work and never held across an
//! `.await`, so every check-then-act on the graph is atomic while the
//! network waits of different expansions interleave freely.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{ExpandError, GraphError};
use crate::graph::GraphStore;
use crate::history::{CommandLog, ExpansionCommand};
use crate::pool::BoundedTaskPool;
use crate::ranker::{Candidate, CandidateRanker};
use crate::source::{ArticleSource, or_zero};
use crate::types::{GraphSnapshot, NewNode, Node, NodeId, PageId, is_excluded_title, normalize_title};

/// Result of [`ExpansionEngine::create_central`]
#[derive(Debug, Clone, PartialEq)]
pub enum CentralOutcome {
    /// The article is already on the graph; nothing was fetched.
    Focused(NodeId),
    /// A new central node was created and expanded.
    Created {
        node_id: NodeId,
        command: Option<ExpansionCommand>,
    },
}

impl CentralOutcome {
    pub fn node_id(&self) -> NodeId {
        match self {
            CentralOutcome::Focused(id) => *id,
            CentralOutcome::Created { node_id, .. } => *node_id,
        }
    }
}

struct Session {
    graph: GraphStore,
    history: CommandLog,
    expanding: HashSet<NodeId>,
    trending: HashSet<String>,
}

/// Marks a node as expanding for as long as it lives
struct ExpansionGuard<'a> {
    state: &'a Mutex<Session>,
    node_id: NodeId,
}

impl Drop for ExpansionGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).expanding.remove(&self.node_id);
    }
}

fn lock(state: &Mutex<Session>) -> MutexGuard<'_, Session> {
    // Session updates are applied whole, so a poisoned lock still holds a
    // consistent graph.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ExpansionEngine<S> {
    source: S,
    config: EngineConfig,
    ranker: CandidateRanker,
    fetch_pool: BoundedTaskPool,
    state: Mutex<Session>,
}

impl<S: ArticleSource> ExpansionEngine<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, EngineConfig::default())
    }

    pub fn with_config(source: S, config: EngineConfig) -> Self {
        Self {
            ranker: CandidateRanker::new(config.link_concurrency, config.max_results),
            fetch_pool: BoundedTaskPool::new(config.fetch_concurrency),
            state: Mutex::new(Session {
                graph: GraphStore::with_style(config.colorize, config.scale),
                history: CommandLog::new(),
                expanding: HashSet::new(),
                trending: HashSet::new(),
            }),
            source,
            config,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.state)
    }

    /// Create the root node for `title` and expand it.
    ///
    /// If the article is already on the graph this is a focus request: the
    /// existing node's id is returned and nothing is fetched or expanded.
    /// Creating the central node is not itself undoable; the recorded command
    /// covers only what its expansion surfaced.
    #[instrument(skip(self), fields(title = %title))]
    pub async fn create_central(
        &self,
        title: &str,
        page_id: Option<PageId>,
    ) -> Result<CentralOutcome, ExpandError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ExpandError::EmptyTitle);
        }
        if let Some(existing) = self.session().graph.find_node_by_label(title) {
            info!(node = existing.id, "article already on the graph");
            return Ok(CentralOutcome::Focused(existing.id));
        }

        let page_id = match page_id {
            Some(id) => Some(id),
            None => or_zero(self.source.resolve_page_id(title).await, "page_id", title),
        };
        let popularity = or_zero(self.source.fetch_popularity(title).await, "popularity", title).max(1);

        let node_id = {
            let mut session = self.session();
            // Another caller may have created it while we were fetching.
            if let Some(existing) = session.graph.find_node_by_label(title) {
                return Ok(CentralOutcome::Focused(existing.id));
            }
            let id = session
                .graph
                .add_node(NewNode::new(title, popularity).with_page_id(page_id))?;
            session.graph.recompute_derived_attributes();
            session.expanding.insert(id);
            id
        };
        let guard = ExpansionGuard {
            state: &self.state,
            node_id,
        };
        info!(node = node_id, popularity, "created central node");

        let command = self.run_expansion(guard, title, page_id).await?;
        Ok(CentralOutcome::Created { node_id, command })
    }

    /// Discover related articles for `title` and attach the best of them to
    /// `node_id`.
    ///
    /// Returns `Ok(None)` when the node is already being expanded, when
    /// nothing related was found, or when every candidate was already
    /// connected. Otherwise the recorded command is returned.
    #[instrument(skip(self), fields(node = node_id, title = %title))]
    pub async fn expand(
        &self,
        node_id: NodeId,
        title: &str,
        page_id: Option<PageId>,
    ) -> Result<Option<ExpansionCommand>, ExpandError> {
        {
            let mut session = self.session();
            if !session.graph.contains_node(node_id) {
                return Err(GraphError::UnknownNode(node_id).into());
            }
            if !session.expanding.insert(node_id) {
                warn!("expansion already in flight, ignoring request");
                return Ok(None);
            }
        }
        let guard = ExpansionGuard {
            state: &self.state,
            node_id,
        };
        self.run_expansion(guard, title, page_id).await
    }

    /// Expand a node using its own label and page id
    pub async fn expand_node(&self, node_id: NodeId) -> Result<Option<ExpansionCommand>, ExpandError> {
        let (label, page_id) = {
            let session = self.session();
            let node = session
                .graph
                .node(node_id)
                .ok_or(GraphError::UnknownNode(node_id))?;
            (node.label.clone(), node.page_id)
        };
        self.expand(node_id, &label, page_id).await
    }

    async fn run_expansion(
        &self,
        guard: ExpansionGuard<'_>,
        title: &str,
        page_id: Option<PageId>,
    ) -> Result<Option<ExpansionCommand>, ExpandError> {
        let ranked = self.discover(title).await;
        let outcome = self
            .session()
            .commit(guard.node_id, title, page_id, ranked);
        drop(guard);
        outcome
    }

    /// Fetch, filter, enrich and rank the related articles of `title`
    async fn discover(&self, title: &str) -> Vec<Candidate> {
        let related = or_zero(
            self.source
                .fetch_related_articles(title, self.config.related_limit)
                .await,
            "related_articles",
            title,
        );

        let seed = normalize_title(title);
        let mut seen = HashSet::new();
        let related: Vec<_> = related
            .into_iter()
            .filter(|article| !is_excluded_title(&article.title))
            .filter(|article| {
                let key = normalize_title(&article.title);
                key != seed && seen.insert(key)
            })
            .collect();
        if related.is_empty() {
            info!("no related articles found");
            return Vec::new();
        }

        let trending = self.session().trending.clone();
        let trending = &trending;
        let total = related.len();
        let outcome = self
            .fetch_pool
            .run_with_progress(
                related,
                |article| async move {
                    let (views, links) = futures::join!(
                        self.source.fetch_popularity(&article.title),
                        self.source.fetch_link_count(&article.title),
                    );
                    let views = or_zero(views, "popularity", &article.title);
                    let link_count = or_zero(links, "link_count", &article.title);
                    // Pageviews are the primary signal; link count stands in when absent.
                    let raw = if views > 0 { views } else { link_count };
                    let is_trending = trending.contains(&normalize_title(&article.title));
                    let popularity = self.config.boosted(raw, is_trending);
                    Ok::<_, Infallible>(
                        Candidate::new(article.title, popularity, link_count)
                            .with_snippet(article.snippet),
                    )
                },
                |done, total| debug!(done, total, "fetched candidate signals"),
            )
            .await;
        let Ok(candidates) = outcome;

        let ranked = self.ranker.prune(&self.source, candidates).await;
        info!(candidates = total, kept = ranked.len(), "ranked related articles");
        ranked
    }

    /// Refresh the trending set used to boost candidate popularity.
    ///
    /// Returns the number of trending titles now known.
    pub async fn refresh_trending(&self) -> usize {
        let titles = or_zero(self.source.fetch_trending_titles().await, "trending", "*");
        let trending: HashSet<String> = titles.iter().map(|title| normalize_title(title)).collect();
        let count = trending.len();
        self.session().trending = trending;
        debug!(count, "refreshed trending titles");
        count
    }

    pub fn is_expanding(&self, node_id: NodeId) -> bool {
        self.session().expanding.contains(&node_id)
    }

    pub fn undo(&self) -> bool {
        let mut session = self.session();
        let Session { graph, history, .. } = &mut *session;
        history.undo(graph)
    }

    pub fn redo(&self) -> Result<bool, GraphError> {
        let mut session = self.session();
        let Session { graph, history, .. } = &mut *session;
        history.redo(graph)
    }

    pub fn can_undo(&self) -> bool {
        self.session().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session().history.can_redo()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.session().graph.snapshot()
    }

    pub fn node(&self, node_id: NodeId) -> Option<Node> {
        self.session().graph.node(node_id).cloned()
    }

    pub fn find_node_by_label(&self, label: &str) -> Option<Node> {
        self.session().graph.find_node_by_label(label).cloned()
    }

    /// Replace the graph with imported data. Imports are not undoable, and
    /// the existing history is dropped since it refers to replaced entities.
    pub fn load_snapshot(&self, snapshot: GraphSnapshot) -> Result<(), GraphError> {
        let mut session = self.session();
        session.graph.load_snapshot(snapshot)?;
        session.history.clear();
        Ok(())
    }

    pub fn set_colorize(&self, enabled: bool) {
        self.session().graph.set_colorize(enabled);
    }

    /// Neighbors of `center` worth expanding next, per the configured
    /// clustering-coefficient window
    pub fn expansion_suggestions(&self, center: NodeId) -> Vec<Node> {
        self.session()
            .graph
            .expansion_suggestions(
                center,
                self.config.suggestion_min_lcc,
                self.config.suggestion_max_lcc,
            )
            .into_iter()
            .cloned()
            .collect()
    }

    /// Run `f` against the graph under the session lock
    pub fn with_graph<R>(&self, f: impl FnOnce(&GraphStore) -> R) -> R {
        f(&self.session().graph)
    }
}

impl Session {
    /// Apply ranked candidates to the graph and record the resulting command.
    ///
    /// Runs entirely under the session lock.
    fn commit(
        &mut self,
        node_id: NodeId,
        title: &str,
        page_id: Option<PageId>,
        ranked: Vec<Candidate>,
    ) -> Result<Option<ExpansionCommand>, ExpandError> {
        if !self.graph.contains_node(node_id) {
            // Undone while the fetches were in flight.
            warn!(node = node_id, "node left the graph during expansion");
            return Ok(None);
        }
        if ranked.is_empty() {
            return Ok(None);
        }
        if let Some(page_id) = page_id {
            self.graph.set_page_id_if_missing(node_id, page_id);
        }

        let seed = normalize_title(title);
        let mut added_nodes = Vec::new();
        let mut added_edges = Vec::new();

        for candidate in ranked {
            if candidate.normalized_title == seed {
                continue;
            }
            let existing = self
                .graph
                .find_node_by_label(&candidate.title)
                .map(|node| node.id);
            match existing {
                Some(existing) => {
                    self.graph
                        .bump_popularity_if_higher(existing, candidate.popularity);
                    if let Some(page_id) = candidate.page_id {
                        self.graph.set_page_id_if_missing(existing, page_id);
                    }
                    if let Some(edge) = self.graph.add_edge_if_absent(node_id, existing)? {
                        debug!(title = %candidate.title, to = existing, "linked existing node");
                        added_edges.push(edge);
                    }
                }
                None => {
                    let id = self.graph.add_node(
                        NewNode::new(candidate.title.clone(), candidate.popularity)
                            .with_parent(node_id)
                            .with_page_id(candidate.page_id)
                            .with_link_count(candidate.link_count),
                    )?;
                    if let Some(edge) = self.graph.add_edge_if_absent(node_id, id)? {
                        added_edges.push(edge);
                    }
                    debug!(title = %candidate.title, id, "added node");
                    added_nodes.push(id);
                }
            }
        }

        self.graph.recompute_derived_attributes();

        let command = ExpansionCommand {
            parent_node_id: node_id,
            added_nodes: added_nodes
                .into_iter()
                .filter_map(|id| self.graph.node(id).cloned())
                .collect(),
            added_edges,
        };
        if command.is_empty() {
            info!(node = node_id, "expansion surfaced nothing new");
            return Ok(None);
        }

        info!(
            node = node_id,
            nodes = command.added_nodes.len(),
            edges = command.added_edges.len(),
            "expansion applied"
        );
        self.history.record(command.clone());
        Ok(Some(command))
    }
}
