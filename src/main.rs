mod aggregate;
mod config;
mod format;
mod index;
mod record;
mod report;
mod serve;
mod store;
mod viewer;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Browse Claude Code session transcripts: per-project session listings,
/// full message history, and token usage, timing and throughput statistics.
#[derive(Parser, Debug)]
#[command(name = "claude-viewer", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "viewer.toml", global = true)]
    config: PathBuf,

    /// Extra logging (skipped lines, directory errors)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve {
        /// Projects directory (overrides config)
        #[arg(long)]
        projects_dir: Option<PathBuf>,

        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print a wall-clock token report for one session file
    Analyze {
        /// Session transcript (.jsonl)
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "claude_viewer=debug"
    } else {
        "claude_viewer=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    match cli.command.unwrap_or(Command::Serve {
        projects_dir: None,
        bind: None,
        port: None,
    }) {
        Command::Analyze { file, json } => {
            let report = report::analyze_file(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report::render(&report));
            }
            Ok(())
        }
        Command::Serve {
            projects_dir,
            bind,
            port,
        } => {
            let mut cfg = config::ViewerConfig::load(&cli.config)?;
            if let Some(dir) = projects_dir {
                cfg.projects.dir = dir;
            }
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            run_server(&cfg).await
        }
    }
}

#[cfg(feature = "serve")]
async fn run_server(cfg: &config::ViewerConfig) -> Result<(), Box<dyn std::error::Error>> {
    serve::run(cfg).await
}

#[cfg(not(feature = "serve"))]
async fn run_server(_cfg: &config::ViewerConfig) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `serve` feature".into())
}
