use anyhow::Result;
use clap::Parser;
use tracing::info;

use orderdesk::{console, init_logging, CliArgs, ClientConfig, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging(LoggingConfig::from_env())?;

    let args = CliArgs::parse();
    let config = ClientConfig::from_args(args)?;
    config.ensure_valid()?;
    info!(api_root = %config.api_root, "starting orderdesk console");

    console::run(config).await
}
