//! Error types for the graph store, article sources and the expansion engine

use crate::types::{EdgeId, NodeId};

/// Invariant violations in the graph store.
///
/// "Already exists" outcomes of the add-if-absent operations are not errors;
/// these variants are reserved for callers that skipped the existence check
/// or handed in inconsistent data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("a node labelled {0:?} already exists")]
    DuplicateLabel(String),

    #[error("unknown node id {0}")]
    UnknownNode(NodeId),

    #[error("node id {0} is already in use")]
    NodeIdInUse(NodeId),

    #[error("edge id {0} is already in use")]
    EdgeIdInUse(EdgeId),

    #[error("nodes {from} and {to} are already connected")]
    DuplicateEdge { from: NodeId, to: NodeId },

    #[error("edge {edge} refers to missing node {node}")]
    DanglingEdge { edge: EdgeId, node: NodeId },

    #[error("no ids left to assign")]
    IdExhausted,
}

/// Failures reported by an [`ArticleSource`](crate::source::ArticleSource).
///
/// The engine never propagates these; they are logged and replaced with a
/// zero signal.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("rate limited after {attempts} attempts: {url}")]
    RateLimited { attempts: u32, url: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),
}

#[cfg(feature = "wikipedia")]
impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

/// Errors returned by [`ExpansionEngine`](crate::engine::ExpansionEngine)
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("article title must not be empty")]
    EmptyTitle,

    #[error(transparent)]
    Graph(#[from] GraphError),
}
