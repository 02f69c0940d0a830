//! Strand Controller
//!
//! Unified controller for the Strand control plane CRDs:
//! - StrandTenant: Ensures a row in the `tenants` table
//! - StrandStream: Creates the stream row and its broker topic
//! - StrandClient: Provisions client credentials and a companion Secret
//! - StrandUser: Provisions users, surfaces generated passwords, handles resets
//! - StrandDataPlane: Reports database and broker connectivity
//! - StrandInit: Runs schema migrations and waits for gateway Deployments
//! - StrandAuthConfig: Applies authentication mode transitions

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod store;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use strand_infra::redact_database_url;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting Strand Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!(
        "  Database: {}",
        config
            .database_url
            .as_deref()
            .map(redact_database_url)
            .unwrap_or_else(|| "disabled".to_string())
    );
    info!(
        "  Brokers: {}",
        if config.brokers.is_empty() {
            "disabled".to_string()
        } else {
            config.brokers.join(",")
        }
    );
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Metrics: {}, health: {}", config.metrics_addr, config.health_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
