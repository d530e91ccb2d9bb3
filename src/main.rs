//! live-feed CLI entry point

mod cli;

use crate::cli::Cli;
use anyhow::{Context, Result};
use clap::Parser;
use live_feed_client::{Envelope, Event, FeedClient, Handlers};
use std::io::Write;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the event stream
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    watch(&cli).await
}

async fn watch(cli: &Cli) -> Result<()> {
    let mut handlers = Handlers::new()
        .on_open(|| info!("Connected to data source"))
        .on_close(|close| {
            warn!(
                code = ?close.code,
                reason = %close.reason,
                clean = close.was_clean,
                "Connection closed"
            )
        })
        .on_error(|e| warn!("Feed error: {}", e));

    for event_type in cli.event_types() {
        handlers = handlers.on_event(event_type, print_event);
    }

    let client = FeedClient::new(cli.config(), handlers);
    info!(
        host = %cli.host,
        port = cli.port,
        types = client.subscription().len(),
        "Starting live feed"
    );
    client.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    client.stop();
    Ok(())
}

fn print_event(event: &Event) {
    match Envelope::encode(event) {
        Ok(line) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{}", line) {
                warn!("Failed to write event: {}", e);
            }
        }
        Err(e) => warn!(event_type = %event.event_type(), "Failed to encode event: {}", e),
    }
}
