//! kwire - Command-line front end for the kwire broker client
//!
//! Runs one admin operation against a broker and prints the outcome.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use kwire_client::{Client, ClientConfig, Deadline};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kwire")]
#[command(about = "Command-line client for Kafka-protocol brokers")]
#[command(version)]
struct Cli {
    /// Broker address
    #[arg(short, long, env = "KWIRE_BROKER", default_value = "127.0.0.1:9092")]
    broker: String,

    /// Client id sent with every request
    #[arg(long)]
    client_id: Option<String>,

    /// Overall deadline for the call, in milliseconds
    #[arg(short = 't', long)]
    timeout_ms: Option<u64>,

    /// YAML config file
    #[arg(short, long, env = "KWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Delete one or more topics
    DeleteTopics {
        /// Topics to delete
        #[arg(required = true)]
        topics: Vec<String>,

        /// How long the broker waits for the deletion to complete
        #[arg(long, conflicts_with = "no_wait")]
        wait_ms: Option<u64>,

        /// Start the deletion and return without waiting
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the API versions the broker supports
    ApiVersions,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match ClientConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(2);
        }
    };
    if let Some(id) = cli.client_id {
        config = config.with_client_id(id);
    }
    if let Some(path) = &cli.config {
        tracing::debug!("Loaded config from {}", path.display());
    }

    let client = Client::new(config);
    let deadline = cli
        .timeout_ms
        .map(|ms| Deadline::after(Duration::from_millis(ms)))
        .unwrap_or(Deadline::NONE);

    let ctx = commands::Context {
        broker: cli.broker,
        deadline,
        json: cli.json,
    };

    match commands::execute(&client, &ctx, cli.command).await {
        Ok(output) => {
            println!("{}", output.text);
            client.close();
            if !output.ok {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
