use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wikinode_core::{ArticleSource, ExpansionEngine, GraphStore, WikipediaSource};

use wikinode_cli::explore::explore;
use wikinode_cli::render::{self, OutputFormat};
use wikinode_cli::shell::{Shell, ShellCommand};
use wikinode_cli::{Overrides, Settings, snapshot};

#[derive(Parser)]
#[command(
    name = "wikinode",
    version,
    about = "wikinode — explore Wikipedia as a growing graph of related articles"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Color nodes by popularity
    #[arg(long, global = true)]
    colorize: bool,

    /// Size nodes on a logarithmic pageview scale
    #[arg(long, global = true)]
    log_scale: bool,

    /// Articles kept per expansion
    #[arg(long, global = true, value_name = "N")]
    max_results: Option<usize>,

    /// Concurrent lookups per expansion
    #[arg(long, global = true, value_name = "N")]
    concurrency: Option<usize>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Start from an article and grow the graph around it
    Explore {
        title: String,
        #[command(flatten)]
        growth: GrowthArgs,
    },
    /// Start from a random article
    Random {
        #[command(flatten)]
        growth: GrowthArgs,
    },
    /// List yesterday's most viewed articles
    Trending {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Render a saved snapshot without touching the network
    Render {
        snapshot: PathBuf,
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Interactive session
    Shell {
        /// Article to open first
        title: Option<String>,
        /// Snapshot to start from
        #[arg(long, value_name = "PATH")]
        import: Option<PathBuf>,
    },
}

#[derive(Args)]
struct GrowthArgs {
    /// Rounds of follow-up expansion after the central article
    #[arg(long, default_value_t = 0)]
    depth: usize,
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Also write the graph to a JSON snapshot
    #[arg(long, short, value_name = "PATH")]
    save: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("wikinode_core={level}").parse()?)
                .add_directive(format!("wikinode_cli={level}").parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply(&Overrides {
        colorize: cli.colorize,
        log_scale: cli.log_scale,
        max_results: cli.max_results,
        concurrency: cli.concurrency,
    });

    match cli.command {
        Command::Render { snapshot: path, format } => {
            let loaded = snapshot::load(&path)?;
            let mut graph = GraphStore::with_style(settings.engine.colorize, settings.engine.scale);
            graph
                .load_snapshot(loaded)
                .with_context(|| format!("{} is inconsistent", path.display()))?;
            println!("{}", render::render(&graph.snapshot(), format)?);
        }
        Command::Trending { limit } => {
            let source = settings.source.build()?;
            let mut titles = source
                .fetch_trending_titles()
                .await
                .context("Failed to fetch trending articles")?;
            titles.truncate(limit);
            print!("{}", render::render_trending(&titles));
        }
        Command::Explore { title, growth } => {
            let engine = ExpansionEngine::with_config(settings.source.build()?, settings.engine);
            grow(&engine, &title, &growth).await?;
        }
        Command::Random { growth } => {
            let engine = ExpansionEngine::with_config(settings.source.build()?, settings.engine);
            let title = engine
                .source()
                .random_title()
                .await
                .context("Failed to fetch a random article")?
                .context("Wikipedia returned no random article")?;
            info!(title = %title, "picked random article");
            grow(&engine, &title, &growth).await?;
        }
        Command::Shell { title, import } => {
            let engine = ExpansionEngine::with_config(settings.source.build()?, settings.engine);
            engine.refresh_trending().await;
            if let Some(path) = import {
                engine
                    .load_snapshot(snapshot::load(&path)?)
                    .with_context(|| format!("{} is inconsistent", path.display()))?;
            }

            let mut shell = Shell::new(&engine);
            let mut stdout = io::stdout();
            if let Some(title) = title {
                let opened = shell
                    .execute(ShellCommand::Open(title))
                    .await?;
                writeln!(stdout, "{opened}")?;
            }
            shell.run(BufReader::new(tokio::io::stdin()), &mut stdout).await?;
        }
    }

    Ok(())
}

async fn grow(engine: &ExpansionEngine<WikipediaSource>, title: &str, growth: &GrowthArgs) -> Result<()> {
    engine.refresh_trending().await;
    explore(engine, title, growth.depth).await?;

    let graph = engine.snapshot();
    if let Some(path) = &growth.save {
        snapshot::save(path, &graph)?;
        info!(path = %path.display(), "saved snapshot");
    }
    println!("{}", render::render(&graph, growth.format)?);
    Ok(())
}
