//! Integration tests for the wikinode CLI
//!
//! These run the built binary as a subprocess. None of them touch the network.

use std::fs;
use std::process::{Command, Output};

fn wikinode(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wikinode"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run CLI")
}

const SNAPSHOT: &str = r#"{
  "nodes": [
    {"id": 1, "label": "Graph theory", "popularity": 90000, "size": 30.0},
    {"id": 2, "label": "Vertex (graph theory)", "popularity": 7000, "parent": 1, "size": 12.0},
    {"id": 3, "label": "Edge \"arc\"", "popularity": 3000, "parent": 1, "size": 12.0}
  ],
  "edges": [
    {"id": 1, "from": 1, "to": 2},
    {"id": 2, "from": 1, "to": 3},
    {"id": 3, "from": 2, "to": 3}
  ]
}"#;

fn snapshot_file() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    fs::write(&path, SNAPSHOT).unwrap();
    (dir, path)
}

#[test]
fn test_cli_help() {
    let output = wikinode(&["--help"]);
    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(output.status.success());
    assert!(stdout.contains("wikinode — explore Wikipedia"));
    assert!(stdout.contains("Usage:"));
    for command in ["explore", "random", "trending", "render", "shell"] {
        assert!(stdout.contains(command), "help should list {command}");
    }
}

#[test]
fn test_cli_version() {
    let output = wikinode(&["--version"]);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(&format!("wikinode {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_cli_render_text() {
    let (_dir, path) = snapshot_file();
    let output = wikinode(&["render", path.to_str().unwrap()]);
    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("🌐 Graph theory"));
    assert!(stdout.contains("• Articles         : 3"));
    assert!(stdout.contains("└─ [2] Vertex (graph theory)"));
    assert!(stdout.contains("Vertex (graph theory) → Edge \"arc\""));
}

#[test]
fn test_cli_render_mermaid() {
    let (_dir, path) = snapshot_file();
    let output = wikinode(&["render", path.to_str().unwrap(), "--format", "mermaid"]);
    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(output.status.success());
    assert!(stdout.starts_with("graph TD"));
    assert!(stdout.contains("N3[\"Edge #quot;arc#quot;\"]"));
    assert!(stdout.contains("N2 --> N3"));
}

#[test]
fn test_cli_render_json_recomputes_sizes_and_colors() {
    let (_dir, path) = snapshot_file();
    let output = wikinode(&["render", path.to_str().unwrap(), "-f", "json", "--colorize"]);
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    let nodes = parsed["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[0]["size"], 30.0);
    assert!(nodes[1]["size"].as_f64().unwrap() > 12.0);
    assert!(nodes.iter().all(|n| n["color"].as_str().is_some_and(|c| c.starts_with("hsl("))));
}

#[test]
fn test_cli_render_rejects_invalid_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, r#"{"nodes": [{"id": 1}]}"#).unwrap();

    let output = wikinode(&["render", path.to_str().unwrap()]);
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!output.status.success());
    assert!(stderr.contains("is not a graph snapshot"));
}

#[test]
fn test_cli_render_rejects_dangling_edges() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dangling.json");
    fs::write(
        &path,
        r#"{"nodes": [{"id": 1, "label": "A", "popularity": 1}], "edges": [{"id": 1, "from": 1, "to": 9}]}"#,
    )
    .unwrap();

    let output = wikinode(&["render", path.to_str().unwrap()]);
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!output.status.success());
    assert!(stderr.contains("is inconsistent"));
}

#[test]
fn test_cli_missing_config_file_fails() {
    let (_dir, path) = snapshot_file();
    let output = wikinode(&[
        "render",
        path.to_str().unwrap(),
        "--config",
        "/nonexistent/wikinode.toml",
    ]);
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!output.status.success());
    assert!(stderr.contains("Failed to read config"));
}
