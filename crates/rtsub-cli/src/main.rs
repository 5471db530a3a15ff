//! rtsub - stream real-time GraphQL subscriptions as JSON lines.

use anyhow::Result;
use clap::Parser;
use rtsub_cli::{AppConfig, Application};
use tracing::info;

/// Real-time GraphQL subscription client
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RTSUB_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// API or real-time endpoint, overrides the configuration file
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Subscription query to open (repeatable)
    #[arg(short, long = "query")]
    queries: Vec<String>,

    /// API key or bearer token, overrides the configured credentials
    #[arg(long)]
    auth: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    rtsub_telemetry::init_logging()?;

    info!("Starting rtsub v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > RTSUB_CONFIG env var > endpoint-only configuration
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("RTSUB_CONFIG").ok());

    let mut config = match &config_path {
        Some(path) => {
            info!(config_path = %path, "Loading configuration");
            AppConfig::from_file(path)?
        }
        None => AppConfig::new(args.endpoint.clone().unwrap_or_default()),
    };
    config.apply_overrides(args.endpoint, args.queries, args.auth);
    info!(
        endpoint = %config.client.endpoint,
        subscriptions = config.subscriptions.len(),
        "Configuration loaded"
    );

    let app = Application::new(config)?;
    app.run().await?;

    Ok(())
}
