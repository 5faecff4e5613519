//! # hamirrord: hamirror daemon
//!
//! Composition root that wires the adapters together and runs the mirror.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Construct the websocket transport and the REST client (adapters)
//! - Build the `Hub`, injecting the adapters via port traits
//! - Start the mirror and list the devices it can expose
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use hamirror_adapter_rest::RestClient;
use hamirror_adapter_websocket::WsTransport;
use hamirror_app::Hub;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Adapters
    let rest = RestClient::new(config.rest_config()).context("failed to build REST client")?;
    let transport = WsTransport::new(config.websocket_config());

    // Hub
    let hub = Hub::new(transport, rest.clone(), rest, config.hub_config()?);
    tracing::info!(base_url = %config.base_url(), "hamirrord starting");

    if let Err(err) = hub.start().await {
        tracing::error!(%err, "hub unreachable, waiting for shutdown");
    }

    for manifest in hub.discover_devices() {
        tracing::info!(
            native_id = %manifest.native_id,
            name = %manifest.name,
            category = ?manifest.category,
            "device available"
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    hub.shutdown().await;

    Ok(())
}
