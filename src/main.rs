use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use voide::assemble::{self, AssembleOptions, DEFAULT_CHUNKS_GLOB};
use voide::container::RESERVED_KEYS;
use voide::graph::exchange::load_graph;
use voide::{BuildCatalog, Message, Result};

#[derive(Parser)]
#[command(name = "voide")]
#[command(about = "Assemble chunk modules and run dataflow graphs", long_about = None)]
struct Cli {
    /// Chunk manifests to load.
    #[arg(long, global = true, default_value = DEFAULT_CHUNKS_GLOB)]
    chunks: String,

    /// JSON file used as the container's `config` mapping.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the container and list the capability keys it holds.
    Ready,

    /// Print the order chunks would be built in.
    Order,

    /// Assemble, then run a graph once and print every node's output.
    Run {
        #[arg(long)]
        graph: PathBuf,

        /// Payload handed to source nodes, as a JSON object.
        #[arg(long, default_value = "{}")]
        payload: String,
    },
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn read_object(text: &str, what: &str) -> Result<Message> {
    match serde_json::from_str::<Value>(text).with_context(|| format!("parse {what}"))? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("{what} must be a JSON object, got {other}"),
    }
}

fn load_config(path: Option<&Path>) -> Result<Message> {
    match path {
        None => Ok(Message::new()),
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("read config {}", p.display()))?;
            read_object(&text, "config")
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let catalog = BuildCatalog::with_builtins();
    let options = AssembleOptions {
        chunks_glob: cli.chunks.clone(),
        config: load_config(cli.config.as_deref())?,
    };

    match cli.cmd {
        Commands::Ready => {
            let container = assemble::assemble(&options, &catalog)?;
            let ready: Vec<&str> = container
                .keys()
                .filter(|k| !RESERVED_KEYS.contains(k))
                .collect();
            if ready.is_empty() {
                println!("READY: <none>");
            } else {
                println!("READY: {}", ready.join(", "));
            }
        }
        Commands::Order => {
            for path in assemble::plan(&options.chunks_glob, &catalog)? {
                println!("{}", path.display());
            }
        }
        Commands::Run { graph, payload } => {
            let payload = read_object(&payload, "payload")?;
            let graph = load_graph(&graph)?;
            let container = assemble::assemble_shared(&options, &catalog)?;
            let runner = voide::compile(graph, container);
            let outputs = runner.run(&payload)?;
            println!("{}", serde_json::to_string_pretty(&outputs)?);
        }
    }

    Ok(())
}
