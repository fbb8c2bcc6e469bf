//! # wikinode-core
//!
//! Core library for growing an exploration graph of Wikipedia articles.
//!
//! This library provides:
//! - A graph store with popularity-derived node size and color
//! - Candidate ranking by link degree and local clustering coefficient
//! - An expansion engine with undo/redo history
//! - A bounded-concurrency task pool for the fan-out of article lookups
//!
//! ## Features
//!
//! - `default`: Graph, ranking and engine against any [`ArticleSource`]
//! - `wikipedia`: [`WikipediaSource`](wikipedia::WikipediaSource), backed by the MediaWiki APIs
//!
//! ## Example
//!
//! ```no_run
//! use wikinode_core::{CentralOutcome, ExpansionEngine};
//! # use wikinode_core::ArticleSource;
//!
//! # async fn example<S: ArticleSource>(source: S) -> anyhow::Result<()> {
//! let engine = ExpansionEngine::new(source);
//! let root = engine.create_central("Graph theory", None).await?.node_id();
//!
//! for suggestion in engine.expansion_suggestions(root) {
//!     engine.expand_node(suggestion.id).await?;
//! }
//!
//! engine.undo();
//! let snapshot = engine.snapshot();
//! println!("{} nodes, {} edges", snapshot.nodes.len(), snapshot.edges.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod history;
pub mod pool;
pub mod ranker;
pub mod source;
pub mod types;

#[cfg(feature = "wikipedia")]
pub mod wikipedia;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{CentralOutcome, ExpansionEngine};
pub use error::{ExpandError, GraphError, SourceError};
pub use graph::{GraphStore, ScaleMode};
pub use history::{CommandLog, ExpansionCommand};
pub use pool::BoundedTaskPool;
pub use ranker::{Candidate, CandidateRanker};
pub use source::ArticleSource;
pub use types::{Edge, EdgeId, GraphSnapshot, NewNode, Node, NodeId, PageId, RelatedArticle};

#[cfg(feature = "wikipedia")]
pub use wikipedia::WikipediaSource;
