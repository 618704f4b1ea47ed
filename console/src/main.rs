//! Admin console command line.
//!
//! Thin front-end over the session client: log in (with two-factor
//! verification), manage people, browse world lookups and read the
//! dashboard. Results are printed as JSON.
//!
//! Configuration comes from `ADMIN_CONSOLE_*` environment variables, read
//! after loading an optional `.env` file.
//!
//! Run with: `cargo run --bin admin-console -- people list --page 1`

mod cli;
mod commands;

use admin_console_client::{ClientConfig, SessionClient};
use anyhow::Context;
use clap::Parser;
use cli::Cli;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Invalid configuration")?;
    if let Some(origin) = cli.origin {
        config.origin = origin;
        config.validate().context("Invalid configuration")?;
    }
    info!(origin = %config.origin, base_path = %config.base_path, "Starting admin console");

    let client = SessionClient::from_config(config)?;
    if client.restore().await {
        info!("Using stored session");
    }

    let output = commands::run(&client, cli.command).await?;
    if !output.is_null() {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}

/// Initialize tracing. Logs go to stderr so stdout stays valid JSON.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admin_console=info,admin_console_client=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
