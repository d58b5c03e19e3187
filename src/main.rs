//! chain-sync daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────┐
//!                 │                    chain-sync                     │
//!                 │                                                   │
//!   config.toml ──┼─▶ config (load, validate, hot reload)             │
//!                 │        │                                          │
//!                 │        ▼                                          │
//!                 │   daemon::Registry ──▶ sync::SubscriptionController│
//!                 │        ▲                     │ fetch              │
//!                 │        │ identity            ▼                    │
//!                 │   blockchain::Session   blockchain resources ─────┼──▶ JSON-RPC
//!                 │        ▲                     ▲ invalidation       │
//!                 │        └──── ChainWatcher ───┘ (ChainEvents)  ────┼──▶ JSON-RPC
//!                 │                                                   │
//!                 │   observability (tracing, prometheus)             │
//!                 │   lifecycle (signals, shutdown)                   │
//!                 └───────────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use chain_sync::blockchain::{
    BlockchainClient, ChainEvents, ChainReader, ChainWatcher, ChainWriter, Session, SignMessage,
    Wallet,
};
use chain_sync::config::watcher::ConfigWatcher;
use chain_sync::config::{load_config, ResourceKind, SyncConfig};
use chain_sync::daemon::{Daemon, Registry};
use chain_sync::lifecycle::signals::wait_for_signal;
use chain_sync::lifecycle::Shutdown;
use chain_sync::observability::{logging, metrics};
use chain_sync::sync::{ActionController, EventSource};

#[derive(Parser)]
#[command(name = "chain-sync")]
#[command(about = "Keep chain state synchronized from a JSON-RPC endpoint", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run until SIGINT/SIGTERM, keeping every resource fresh
    Watch,
    /// Validate the configuration and print the resolved resources
    Check,
    /// Read every resource once and print the states
    Snapshot,
    /// Sign a message with the configured wallet
    Sign { message: String },
}

#[derive(Serialize)]
struct ResolvedResource<'a> {
    name: &'a str,
    kind: ResourceKind,
    watch: bool,
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SyncConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "chain-sync starting");

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Check => check(&config),
        Commands::Snapshot => snapshot(config).await,
        Commands::Sign { message } => sign(&config, message).await,
        Commands::Watch => watch(config, cli.config).await,
    }
}

fn check(config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let resolved: Vec<_> = config
        .resources
        .iter()
        .map(|r| ResolvedResource {
            name: &r.name,
            kind: r.kind,
            watch: r.watch_or(&config.defaults),
            interval_ms: r.interval_or(&config.defaults),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

struct Collaborators {
    client: Option<BlockchainClient>,
    wallet: Option<Wallet>,
    events: Arc<ChainEvents>,
    session: Arc<Session>,
}

async fn connect(config: &SyncConfig) -> Result<Collaborators, Box<dyn std::error::Error>> {
    let client = if config.blockchain.enabled {
        Some(BlockchainClient::new(config.blockchain.clone()).await?)
    } else {
        tracing::warn!("Blockchain integration disabled; reads will report it unavailable");
        None
    };

    let wallet = match Wallet::from_env(config.blockchain.chain_id) {
        Ok(wallet) => Some(wallet),
        Err(e) => {
            tracing::info!(reason = %e, "No wallet loaded");
            None
        }
    };

    let events = Arc::new(ChainEvents::new());
    let session = Arc::new(Session::new(Arc::clone(&events)));
    session.set_account(wallet.as_ref().map(Wallet::address));

    Ok(Collaborators {
        client,
        wallet,
        events,
        session,
    })
}

async fn snapshot(mut config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.defaults.watch = false;
    for resource in &mut config.resources {
        resource.watch = Some(false);
    }

    let collaborators = connect(&config).await?;
    let mut registry = Registry::new(
        ChainReader::new(collaborators.client),
        collaborators.session,
        None,
    );
    registry.apply(&config);

    let limit = Duration::from_secs(config.blockchain.rpc_timeout_secs.saturating_mul(2) + 1);
    if !registry.settle_all(limit).await {
        tracing::warn!("Some resources did not settle in time");
    }
    println!("{}", serde_json::to_string_pretty(&registry.snapshot()?)?);
    registry.unbind_all();
    Ok(())
}

async fn sign(config: &SyncConfig, message: String) -> Result<(), Box<dyn std::error::Error>> {
    let collaborators = connect(config).await?;
    let signer = ActionController::new(Arc::new(SignMessage(ChainWriter::new(
        collaborators.client,
        collaborators.wallet,
    ))));
    let signature = signer.invoke(message.into_bytes()).await?;
    println!("{}", serde_json::to_string_pretty(&signature)?);
    Ok(())
}

async fn watch(
    config: SyncConfig,
    path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let collaborators = connect(&config).await?;
    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let mut watcher_task = None;
    let mut events: Option<Arc<dyn EventSource>> = None;
    if let Some(client) = collaborators.client.clone() {
        let watcher = ChainWatcher::new(
            client,
            Arc::clone(&collaborators.events),
            Arc::clone(&collaborators.session),
            config.watcher.clone(),
        );
        watcher_task = Some(tokio::spawn(watcher.run(shutdown.subscribe())));
        events = Some(collaborators.events.clone() as Arc<dyn EventSource>);
    }

    // The notify watcher must stay alive for the life of the daemon.
    let (config_rx, _config_watcher) = match path {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(&path);
            match watcher.run() {
                Ok(handle) => (rx, Some(handle)),
                Err(e) => {
                    tracing::error!(error = %e, "Config hot reload unavailable");
                    (rx, None)
                }
            }
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let mut registry = Registry::new(
        ChainReader::new(collaborators.client),
        collaborators.session,
        events.clone(),
    );
    registry.apply(&config);

    Daemon::new(registry, events)
        .run(config_rx, shutdown.subscribe())
        .await;

    if let Some(task) = watcher_task {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
