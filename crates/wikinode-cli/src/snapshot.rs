//! Snapshot files: pretty JSON on disk

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use wikinode_core::GraphSnapshot;

pub fn save(path: &Path, snapshot: &GraphSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn load(path: &Path) -> Result<GraphSnapshot> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a graph snapshot", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikinode_core::{GraphStore, NewNode};

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.json");

        let mut graph = GraphStore::new();
        graph.add_node(NewNode::new("Rust", 10)).unwrap();
        graph.recompute_derived_attributes();
        let snapshot = graph.snapshot();

        save(&path, &snapshot).unwrap();
        assert_eq!(load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_load_rejects_other_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");
        fs::write(&path, r#"{"nodes": "nope"}"#).unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("is not a graph snapshot"));
    }
}
