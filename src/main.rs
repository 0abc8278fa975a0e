//! Wharf CLI - publisher-funded uploads from the command line
//!
//! The user-paid protocol needs a connected wallet and lives behind the
//! library API; this binary drives the wallet-free publisher path.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wharf::{Address, Network, NetworkConfig, PublisherClient, MAX_EPOCHS};

/// Wharf - publisher-funded uploads to quilt-based blob storage
#[derive(Parser, Debug, Clone)]
#[command(name = "wharf")]
#[command(about = "Store files on the quilt storage network via a publisher")]
struct Args {
    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Storage duration in whole epochs
    #[arg(long, env = "WHARF_EPOCHS", default_value = "1")]
    epochs: u32,

    /// Account address that receives the storage objects
    #[arg(long, env = "WHARF_ACCOUNT")]
    account: String,

    /// Publisher endpoint override
    #[arg(long, env = "WHARF_PUBLISHER_URL")]
    publisher_url: Option<String>,

    /// Target network
    #[arg(long, env = "WHARF_NETWORK", default_value = "testnet")]
    network: Network,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn validate(&self) -> Result<(), String> {
        if self.epochs < 1 || self.epochs > MAX_EPOCHS {
            return Err(format!(
                "epochs must be between 1 and {}, got {}",
                MAX_EPOCHS, self.epochs
            ));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("wharf={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let account = Address::parse(&args.account)?;

    let mut config = NetworkConfig::from_env();
    config.network = args.network;
    if let Some(url) = args.publisher_url.clone() {
        config.publisher_url = url;
    }

    info!("Wharf - publisher-funded upload");
    info!("Network: {}", config.network);
    info!("Publisher: {}", config.publisher_url);
    info!("Account: {}", account);
    info!("Epochs: {}", args.epochs);

    let client = PublisherClient::new(config);

    for path in &args.files {
        let payload = tokio::fs::read(path).await?;
        info!(file = %path.display(), size = payload.len(), "Uploading");

        let result = client
            .upload_blob(payload.into(), args.epochs, &account)
            .await?;

        println!("{}\t{}", path.display(), result.bundle_id);
    }

    Ok(())
}
