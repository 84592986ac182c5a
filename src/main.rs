//! beepnode - Peer-to-peer append-only log replication
//!
//! Runs one replication node: the HTTP API, peer discovery and the
//! periodic sync loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beepnode::api::HttpServer;
use beepnode::config::{BeepConfig, LoggingConfig};
use beepnode::error::Result;
use beepnode::node::Node;

/// beepnode - Peer-to-peer append-only log replication
#[derive(Parser)]
#[command(name = "beepnode")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "beepnode.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the node
    Start,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "beepnode.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Show node information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the config file when it is readable
    let logging = BeepConfig::from_file(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(cli.log_level.as_deref().unwrap_or(logging.level.as_str()), &logging);

    match cli.command {
        Commands::Start => run_start(cli.config).await,
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(cli.config),
        Commands::Info => run_info(cli.config),
    }
}

fn init_logging(level: &str, logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let compact = logging.format == "compact";
    let pretty_layer = (!compact).then(|| tracing_subscriber::fmt::layer());
    let compact_layer = compact.then(|| tracing_subscriber::fmt::layer().compact());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty_layer)
        .with(compact_layer)
        .init();
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(config_path: &Path) -> Result<BeepConfig> {
    if !config_path.exists() {
        tracing::warn!(
            "Config file {:?} not found, using defaults (run `beepnode init` to create one)",
            config_path
        );
        return Ok(BeepConfig::default());
    }

    match BeepConfig::from_file(config_path) {
        Ok(config) => Ok(config),
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            tracing::error!("Please check that the config file is valid TOML");
            Err(e)
        }
    }
}

async fn run_start(config_path: PathBuf) -> Result<()> {
    tracing::info!("Starting beepnode...");

    let config = load_config(&config_path)?;
    tracing::info!("Loaded configuration for node: {}", config.node.id);

    let node = match Node::new(config.clone()) {
        Ok(node) => Arc::new(node),
        Err(e) => {
            tracing::error!("Failed to create node: {}", e);
            return Err(e);
        }
    };

    if !config.api.enabled {
        tracing::warn!("HTTP API disabled: peers will not be able to pull from this node");
        node.start(None).await?;

        tokio::signal::ctrl_c().await?;
        tracing::info!("Received shutdown signal");
        node.stop().await;
        return Ok(());
    }

    // Bind first so we announce the port we actually got
    let server = HttpServer::new(config.api.clone(), Arc::clone(&node));
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP API on {}: {}", config.api.bind_address, e);
            return Err(e);
        }
    };
    let port = listener.local_addr()?.port();

    node.start(Some(port)).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Received shutdown signal");
    };

    let result = server.serve(listener, shutdown).await;
    node.stop().await;

    if let Err(e) = &result {
        tracing::error!("HTTP server error: {}", e);
    }
    tracing::info!("beepnode stopped");
    result
}

fn run_init(output: PathBuf) -> Result<()> {
    let config = BeepConfig::default();
    let content = format!(
        "# beepnode Configuration\n# Generated configuration file\n\n{}",
        config.to_toml()?
    );

    std::fs::write(&output, content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nAdd seed peers under [replication] if broadcast discovery is unavailable.");
    println!("Then start with: beepnode --config {} start", output.display());

    Ok(())
}

fn run_validate(config_path: PathBuf) -> Result<()> {
    match BeepConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Node ID: {}", config.node.id);
            println!("  API Address: {}", config.api.bind_address);
            println!("  Service Name: {}", config.discovery.service_name);
            println!("  Seed Peers: {}", config.replication.peers.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

fn run_info(config_path: PathBuf) -> Result<()> {
    let config = BeepConfig::from_file(&config_path)?;

    println!("beepnode Node Information");
    println!("=========================");
    println!();
    println!("Node ID:          {}", config.node.id);
    println!(
        "Advertise Host:   {}",
        config.node.advertise_host.as_deref().unwrap_or("(not set)")
    );
    println!();
    println!("API Configuration:");
    println!("  Enabled:        {}", config.api.enabled);
    println!("  Bind Address:   {}", config.api.bind_address);
    println!("  CORS:           {}", config.api.cors_enabled);
    println!();
    println!("Discovery Configuration:");
    println!("  Enabled:        {}", config.discovery.enabled);
    println!("  Service Name:   {}", config.discovery.service_name);
    println!("  UDP Port:       {}", config.discovery.port);
    println!("  Broadcast:      {} ms", config.discovery.broadcast_interval_ms);
    println!();
    println!("Replication Configuration:");
    println!("  Sync Interval:  {} ms", config.replication.sync_interval_ms);
    match config.replication.request_timeout_ms {
        Some(timeout) => println!("  Timeout:        {} ms", timeout),
        None => println!("  Timeout:        (none)"),
    }
    println!("  Seed Peers:     {:?}", config.replication.peers);

    Ok(())
}
