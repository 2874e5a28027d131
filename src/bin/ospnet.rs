//! ospnet CLI tool
//!
//! Command-line interface for replaying and querying an outside-plant topology.
//!
//! ## Commands
//!
//! - `apply <commands>`: Execute JSON-lines commands against the event log
//! - `line <id>`: Print a line with its segments
//! - `relations <point>`: Classify every segment at a route node
//! - `traverse <segment>`: List everything reachable from a segment
//! - `fingerprint`: Rebuild the projection and print its fingerprint

use clap::{Args, Parser, Subcommand};
use ospnet_core::{
    commands::Command,
    config::{ConfigProvider, TomlConfigProvider},
    properties::{LineId, RouteNodeId, SegmentId, Uuid},
    route::InMemoryRouteNetwork,
    topology::TopologyStore,
};
use std::{
    fs::read_to_string,
    path::PathBuf,
    sync::Arc,
};

#[derive(Parser)]
#[command(name = "ospnet")]
#[command(author, version, about = "Replay and query outside-plant line topology", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Route network TOML document
    #[arg(short, long)]
    network: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-lines event log, overriding the configured one
    #[arg(short, long)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute commands, one JSON object per line
    Apply {
        /// Path to the command file
        commands: PathBuf,

        /// Keep going after a rejected command
        #[arg(short, long)]
        keep_going: bool,
    },

    /// Print a line with its segments and derived parent/child links
    Line { id: LineId },

    /// Classify the segments at a route node
    Relations {
        point: RouteNodeId,

        /// Only segments whose id or line id matches
        #[arg(short, long)]
        filter: Option<Uuid>,
    },

    /// Undirected traversal from a segment
    Traverse { segment: SegmentId },

    /// Rebuild the projection from the log and print its fingerprint
    Fingerprint,
}

fn open_store(args: &StoreArgs) -> Result<TopologyStore, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => TomlConfigProvider::new(path.clone()).get_config()?,
        None => Default::default(),
    };
    if let Some(log) = &args.log {
        config.event_log = Some(log.clone());
    }
    if config.event_log.is_none() {
        tracing::warn!("No event log configured; changes will not outlive this process");
    }
    let network = Arc::new(InMemoryRouteNetwork::load(&args.network)?);
    Ok(TopologyStore::new(network, config)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli.store)?;

    match cli.command {
        Commands::Apply {
            commands,
            keep_going,
        } => {
            let content = read_to_string(&commands)?;
            let mut rejected = 0usize;
            for (idx, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let command: Command = serde_json::from_str(line)?;
                match store.execute(command) {
                    Ok(applied) => {
                        for version in applied {
                            println!("{} -> v{}", version.line, version.version);
                        }
                    }
                    Err(e) if keep_going => {
                        rejected += 1;
                        eprintln!("{}:{}: {e}", commands.display(), idx + 1);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            if rejected > 0 {
                println!("{rejected} command(s) rejected");
            }
            Ok(())
        }

        Commands::Line { id } => {
            let info = store.get_line(&id)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }

        Commands::Relations { point, filter } => {
            for relation in store.relations_at(&point, filter)? {
                println!("{relation}");
            }
            Ok(())
        }

        Commands::Traverse { segment } => {
            for node in store.traverse(&segment)? {
                println!("{node}");
            }
            Ok(())
        }

        Commands::Fingerprint => {
            println!("{}", store.reload()?);
            Ok(())
        }
    }
}
