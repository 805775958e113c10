//! Template Webhook
//!
//! Validating admission webhook for the experimental Cluster API template kinds:
//! - ClusterTemplate: rejects templates that populate per-cluster fields
//! - MachineDeploymentTemplate: accepted as-is
//!
//! TLS is expected to be terminated in front of the server.

mod admission;
mod error;

use std::env;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9443";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Template Webhook");

    let bind_addr = env::var("WEBHOOK_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

    info!("Configuration:");
    info!("  Bind address: {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    axum::serve(listener, admission::router())
        .await
        .context("webhook server failed")?;

    Ok(())
}
