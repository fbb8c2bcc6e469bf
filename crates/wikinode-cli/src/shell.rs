//! Interactive exploration session

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use wikinode_core::{ArticleSource, CentralOutcome, ExpansionEngine, NodeId};

use crate::render::{self, describe_command};
use crate::snapshot;

pub const HELP: &str = "\
Commands:
  open <title>        Add an article as a central node and expand it
  expand <id>         Expand a node by id
  undo | redo         Step through the expansion history
  show                Print the article tree
  json | mermaid      Print the graph as JSON or a Mermaid flowchart
  suggest [id]        Neighbors worth expanding next (default: last opened)
  colorize on|off     Color nodes by popularity
  save <path>         Write the graph to a JSON snapshot
  load <path>         Replace the graph with a JSON snapshot
  help                Show this help message
  quit                Leave the shell";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Open(String),
    Expand(NodeId),
    Undo,
    Redo,
    Show,
    Json,
    Mermaid,
    Suggest(Option<NodeId>),
    Colorize(bool),
    Save(PathBuf),
    Load(PathBuf),
    Help,
    Quit,
}

impl ShellCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "open" => ShellCommand::Open(required(rest, "open <title>")?.to_string()),
            "expand" => ShellCommand::Expand(parse_id(required(rest, "expand <id>")?)?),
            "undo" => ShellCommand::Undo,
            "redo" => ShellCommand::Redo,
            "show" => ShellCommand::Show,
            "json" => ShellCommand::Json,
            "mermaid" => ShellCommand::Mermaid,
            "suggest" if rest.is_empty() => ShellCommand::Suggest(None),
            "suggest" => ShellCommand::Suggest(Some(parse_id(rest)?)),
            "colorize" => match rest {
                "on" => ShellCommand::Colorize(true),
                "off" => ShellCommand::Colorize(false),
                _ => bail!("usage: colorize on|off"),
            },
            "save" => ShellCommand::Save(PathBuf::from(required(rest, "save <path>")?)),
            "load" => ShellCommand::Load(PathBuf::from(required(rest, "load <path>")?)),
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => bail!("unknown command {other:?}; try `help`"),
        };
        Ok(Some(command))
    }
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str> {
    if rest.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(rest)
}

fn parse_id(raw: &str) -> Result<NodeId> {
    raw.trim_start_matches('#')
        .parse()
        .with_context(|| format!("{raw:?} is not a node id"))
}

/// Shell state that outlives a single command
pub struct Shell<'a, S> {
    engine: &'a ExpansionEngine<S>,
    focus: Option<NodeId>,
}

impl<'a, S: ArticleSource> Shell<'a, S> {
    pub fn new(engine: &'a ExpansionEngine<S>) -> Self {
        Self {
            engine,
            focus: None,
        }
    }

    pub fn focus(&self) -> Option<NodeId> {
        self.focus
    }

    /// Read commands from `input` until `quit` or end of input
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        loop {
            write!(out, "wikinode> ")?;
            out.flush()?;
            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                writeln!(out)?;
                break;
            };

            let command = match ShellCommand::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    writeln!(out, "error: {err:#}")?;
                    continue;
                }
            };
            if command == ShellCommand::Quit {
                break;
            }
            match self.execute(command).await {
                Ok(output) => writeln!(out, "{}", output.trim_end())?,
                Err(err) => writeln!(out, "error: {err:#}")?,
            }
        }
        Ok(())
    }

    /// Run one command and return what it prints
    pub async fn execute(&mut self, command: ShellCommand) -> Result<String> {
        let engine = self.engine;
        match command {
            ShellCommand::Open(title) => match engine.create_central(&title, None).await? {
                CentralOutcome::Focused(id) => {
                    self.focus = Some(id);
                    Ok(format!("{title:?} is already on the graph as [{id}]"))
                }
                CentralOutcome::Created { node_id, command } => {
                    self.focus = Some(node_id);
                    let summary = command
                        .as_ref()
                        .map(describe_command)
                        .unwrap_or_else(|| "no related articles found".to_string());
                    Ok(format!("[{node_id}] {title}: {summary}"))
                }
            },
            ShellCommand::Expand(id) => Ok(match engine.expand_node(id).await? {
                Some(command) => describe_command(&command),
                None => format!("nothing new around [{id}]"),
            }),
            ShellCommand::Undo => Ok(if engine.undo() {
                "undone".to_string()
            } else {
                "nothing to undo".to_string()
            }),
            ShellCommand::Redo => Ok(if engine.redo()? {
                "redone".to_string()
            } else {
                "nothing to redo".to_string()
            }),
            ShellCommand::Show => Ok(render::render_text(&engine.snapshot())),
            ShellCommand::Json => render::render(&engine.snapshot(), render::OutputFormat::Json),
            ShellCommand::Mermaid => Ok(render::graph_to_mermaid(&engine.snapshot())),
            ShellCommand::Suggest(id) => {
                let id = id
                    .or(self.focus)
                    .ok_or_else(|| anyhow!("no node given and nothing opened yet"))?;
                let center = engine
                    .node(id)
                    .ok_or_else(|| anyhow!("no node [{id}] on the graph"))?;
                Ok(render::render_suggestions(
                    &center,
                    &engine.expansion_suggestions(id),
                ))
            }
            ShellCommand::Colorize(enabled) => {
                engine.set_colorize(enabled);
                Ok(format!("colorize {}", if enabled { "on" } else { "off" }))
            }
            ShellCommand::Save(path) => {
                snapshot::save(&path, &engine.snapshot())?;
                Ok(format!("saved to {}", path.display()))
            }
            ShellCommand::Load(path) => {
                let loaded = snapshot::load(&path)?;
                let count = loaded.nodes.len();
                engine
                    .load_snapshot(loaded)
                    .with_context(|| format!("{} is inconsistent", path.display()))?;
                self.focus = None;
                Ok(format!("loaded {count} article(s) from {}", path.display()))
            }
            ShellCommand::Help => Ok(HELP.to_string()),
            ShellCommand::Quit => Ok(String::new()),
        }
    }
}
