//! beepctl - Command line client for a beepnode
//!
//! Usage:
//!   beepctl logs                  - List logs and their sizes
//!   beepctl log <key>             - Show every message in a log
//!   beepctl append <key> ...      - Append a message to a log
//!   beepctl query <type> [id]     - Query the materialized view
//!   beepctl peers                 - Show known peers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use beepnode::api::{ErrorResponse, HealthResponse};
use beepnode::config::BeepConfig;
use beepnode::log::{AppendOnlyLog, Entry, LogSummary, MessageDraft, SeqNum};
use beepnode::network::Peer;
use beepnode::view::ViewRecord;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";

/// beepnode control tool
#[derive(Parser)]
#[command(name = "beepctl")]
#[command(about = "Read, append and query logs on a beepnode", long_about = None)]
struct Cli {
    /// Path to config file, used to find the API address
    #[arg(short, long, default_value = "beepnode.toml")]
    config: PathBuf,

    /// API endpoint to connect to (overrides config)
    #[arg(short, long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every log with its size
    Logs,
    /// Show every message in one log
    Log {
        key: String,
    },
    /// Show a single message
    Message {
        key: String,
        seq_num: SeqNum,
    },
    /// Append a message to a log (creates the log if needed)
    Append {
        key: String,
        /// Resource id
        #[arg(long)]
        id: String,
        /// Resource type
        #[arg(long = "type")]
        resource_type: String,
        /// Message text
        #[arg(long, default_value = "")]
        text: String,
    },
    /// Query the materialized view by type, or by type and id
    Query {
        resource_type: String,
        id: Option<String>,
    },
    /// Show peers the node knows about
    Peers,
    /// Show node health
    Health,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let endpoint = match &cli.endpoint {
        Some(e) => e.trim_end_matches('/').to_string(),
        None => endpoint_from_config(&cli.config),
    };

    let client = reqwest::Client::new();

    let result = match cli.command {
        Commands::Logs => list_logs(&client, &endpoint).await,
        Commands::Log { key } => show_log(&client, &endpoint, &key).await,
        Commands::Message { key, seq_num } => show_message(&client, &endpoint, &key, seq_num).await,
        Commands::Append { key, id, resource_type, text } => {
            let draft = MessageDraft { id, resource_type, text };
            append(&client, &endpoint, &key, draft).await
        }
        Commands::Query { resource_type, id } => {
            query(&client, &endpoint, &resource_type, id.as_deref()).await
        }
        Commands::Peers => list_peers(&client, &endpoint).await,
        Commands::Health => show_health(&client, &endpoint).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Derive a local endpoint from the node's configured bind address
fn endpoint_from_config(path: &Path) -> String {
    if !path.exists() {
        return DEFAULT_ENDPOINT.to_string();
    }

    match BeepConfig::from_file(path) {
        Ok(config) => {
            let addr = config.api.bind_address;
            if addr.starts_with("0.0.0.0") {
                format!("http://127.0.0.1:{}", addr.rsplit(':').next().unwrap_or("8080"))
            } else {
                format!("http://{}", addr)
            }
        }
        Err(_) => DEFAULT_ENDPOINT.to_string(),
    }
}

/// Decode a JSON response, turning API error bodies into errors
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> anyhow::Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.context("invalid response body");
    }

    match response.json::<ErrorResponse>().await {
        Ok(body) => bail!("{} ({}, HTTP {})", body.error, body.code, status),
        Err(_) => bail!("API error: {}", status),
    }
}

async fn get<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> anyhow::Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("could not reach {}", url))?;
    read_json(response).await
}

fn print_entry(entry: &Entry) {
    println!(
        "{:<6} {:<12} {:<20} {}",
        entry.message.seq_num, entry.message.resource_type, entry.message.id, entry.message.text
    );
}

async fn list_logs(client: &reqwest::Client, endpoint: &str) -> anyhow::Result<()> {
    let logs: Vec<LogSummary> = get(client, &format!("{}/api/logs", endpoint)).await?;

    if logs.is_empty() {
        println!("No logs");
        return Ok(());
    }

    println!("{:<40} {:>8}", "LOG", "SIZE");
    println!("{}", "-".repeat(49));
    for log in &logs {
        println!("{:<40} {:>8}", log.key, log.size);
    }
    Ok(())
}

async fn show_log(client: &reqwest::Client, endpoint: &str, key: &str) -> anyhow::Result<()> {
    let log: AppendOnlyLog = get(client, &format!("{}/api/logs/{}", endpoint, key)).await?;

    println!("Log %{} ({} messages)", log.key(), log.size());
    println!();
    println!("{:<6} {:<12} {:<20} {}", "SEQ", "TYPE", "ID", "TEXT");
    println!("{}", "-".repeat(60));
    for entry in log.get_all() {
        print_entry(entry);
    }
    Ok(())
}

async fn show_message(
    client: &reqwest::Client,
    endpoint: &str,
    key: &str,
    seq_num: SeqNum,
) -> anyhow::Result<()> {
    let entry: Entry = get(client, &format!("{}/api/logs/{}/{}", endpoint, key, seq_num)).await?;
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

async fn append(
    client: &reqwest::Client,
    endpoint: &str,
    key: &str,
    draft: MessageDraft,
) -> anyhow::Result<()> {
    let url = format!("{}/api/logs/{}", endpoint, key);
    let response = client
        .post(&url)
        .json(&draft)
        .send()
        .await
        .with_context(|| format!("could not reach {}", url))?;
    let entry: Entry = read_json(response).await?;

    println!("Appended to %{} at seqNum {}", key, entry.message.seq_num);
    Ok(())
}

async fn query(
    client: &reqwest::Client,
    endpoint: &str,
    resource_type: &str,
    id: Option<&str>,
) -> anyhow::Result<()> {
    let records: Vec<ViewRecord> = match id {
        Some(id) => {
            let url = format!("{}/api/query/{}/{}", endpoint, resource_type, id);
            vec![get(client, &url).await?]
        }
        None => get(client, &format!("{}/api/query/{}", endpoint, resource_type)).await?,
    };

    if records.is_empty() {
        println!("No {} resources", resource_type);
        return Ok(());
    }

    println!("{:<20} {:<30} {:<6} {}", "ID", "AUTHOR", "SEQ", "TEXT");
    println!("{}", "-".repeat(70));
    for record in &records {
        println!(
            "{:<20} {:<30} {:<6} {}",
            record.message.id, record.key, record.message.seq_num, record.message.text
        );
    }
    Ok(())
}

async fn list_peers(client: &reqwest::Client, endpoint: &str) -> anyhow::Result<()> {
    let peers: Vec<Peer> = get(client, &format!("{}/api/peers", endpoint)).await?;

    if peers.is_empty() {
        println!("No peers");
        return Ok(());
    }

    println!("{:<6} {:<25} {}", "ID", "ADDRESS", "DISCOVERED");
    println!("{}", "-".repeat(60));
    for peer in &peers {
        println!(
            "{:<6} {:<25} {}",
            peer.id,
            peer.address(),
            peer.discovered_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn show_health(client: &reqwest::Client, endpoint: &str) -> anyhow::Result<()> {
    let health: HealthResponse = get(client, &format!("{}/health", endpoint)).await?;

    println!("Node:     {}", health.node_id);
    println!("Healthy:  {}", health.healthy);
    println!("Logs:     {}", health.logs);
    println!("Peers:    {}", health.peers);
    println!("Uptime:   {}s", health.uptime_seconds);
    Ok(())
}
