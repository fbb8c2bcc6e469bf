//! Building blocks of the `wikinode` binary
//!
//! Kept in a library so they can be tested without going through the
//! network-backed source.

pub mod explore;
pub mod render;
pub mod settings;
pub mod shell;
pub mod snapshot;

pub use render::OutputFormat;
pub use settings::{Overrides, Settings};
