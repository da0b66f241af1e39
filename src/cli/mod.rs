//! Command-line interface for regharvest.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::runner::Harvester;
use crate::server;
use crate::store::{
    BlobStore, DocumentStore, FsBlobStore, MemoryBlobStore, MemoryDocumentStore,
    SqliteDocumentStore,
};

#[derive(Parser)]
#[command(name = "regharvest", about = "Intermediary registry scraper", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(
        long,
        global = true,
        default_value = "regharvest.toml",
        env = "REGHARVEST_CONFIG"
    )]
    config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape all configured sources and persist the results.
    Run {
        /// Only scrape the named source.
        #[arg(long)]
        source: Option<String>,
        /// Scrape without persisting to the configured stores.
        #[arg(long)]
        dry_run: bool,
    },
    /// List configured sources.
    Sources,
    /// Serve the HTTP trigger endpoint.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
}

/// Check for the verbose flag before clap parses, so logging can be
/// initialized first.
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Run { source, dry_run } => run_scrape(&config, source.as_deref(), dry_run).await,
        Command::Sources => {
            list_sources(&config);
            Ok(())
        }
        Command::Serve { bind } => {
            let harvester = build_harvester(&config, false)?;
            server::serve(&bind, harvester, config.sources.clone()).await
        }
    }
}

fn build_harvester(config: &Config, dry_run: bool) -> anyhow::Result<Harvester> {
    let (docs, blobs): (Arc<dyn DocumentStore>, Arc<dyn BlobStore>) = if dry_run {
        (
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryBlobStore::new()),
        )
    } else {
        (
            Arc::new(SqliteDocumentStore::open(&config.database_path())?),
            Arc::new(FsBlobStore::new(config.snapshot_dir())),
        )
    };

    Ok(Harvester::new(
        docs,
        blobs,
        config.limits.scrape_limits(),
        config.limits.timeout(),
        config.limits.request_delay(),
    )
    .with_deadline(config.limits.deadline()))
}

async fn run_scrape(config: &Config, only: Option<&str>, dry_run: bool) -> anyhow::Result<()> {
    if config.sources.is_empty() {
        bail!("No sources configured");
    }

    let sources: BTreeMap<_, _> = match only {
        Some(name) => {
            let Some(source) = config.sources.get(name) else {
                bail!("Unknown source: {}", name);
            };
            BTreeMap::from([(name.to_string(), source.clone())])
        }
        None => config.sources.clone(),
    };

    let harvester = build_harvester(config, dry_run)?;
    let summary = harvester.run(&sources).await;

    println!("{}", summary.report());
    Ok(())
}

fn list_sources(config: &Config) {
    if config.sources.is_empty() {
        println!("No sources configured");
        return;
    }
    for (name, source) in &config.sources {
        println!("{}: {} ({})", name, source.url, source.layout);
    }
}
