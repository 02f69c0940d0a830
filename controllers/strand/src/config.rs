//! Controller configuration from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::time::Duration;
use strand_infra::parse_brokers;

/// Default control-plane database
pub const DEFAULT_DATABASE_URL: &str = "postgres://root@strand-cockroachdb:26257/stranddb?sslmode=disable";
/// Default bootstrap broker
pub const DEFAULT_BROKER_URL: &str = "strand-redpanda:9092";
/// Default Prometheus listen address
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";
/// Default health probe listen address
pub const DEFAULT_HEALTH_ADDR: &str = "0.0.0.0:8081";
/// Default timeout for connectivity probes and broker dials
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Control-plane database URL, `None` disables the database gateway
    pub database_url: Option<String>,
    /// Bootstrap brokers, empty disables topic creation
    pub brokers: Vec<String>,
    /// Namespace to watch, all namespaces when `None`
    pub namespace: Option<String>,
    pub metrics_addr: SocketAddr,
    pub health_addr: SocketAddr,
    pub probe_timeout: Duration,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = Some(get("DATABASE_URL", DEFAULT_DATABASE_URL))
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        let brokers = parse_brokers(&get("BROKER_URL", DEFAULT_BROKER_URL));
        let namespace = lookup("WATCH_NAMESPACE")
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty());

        let metrics_addr = parse_addr("METRICS_ADDR", &get("METRICS_ADDR", DEFAULT_METRICS_ADDR))?;
        let health_addr = parse_addr("HEALTH_ADDR", &get("HEALTH_ADDR", DEFAULT_HEALTH_ADDR))?;

        let timeout_raw = get("PROBE_TIMEOUT_SECS", &DEFAULT_PROBE_TIMEOUT_SECS.to_string());
        let probe_timeout = match timeout_raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ControllerError::InvalidConfig(format!(
                    "PROBE_TIMEOUT_SECS must be a positive integer, got '{timeout_raw}'"
                )))
            }
        };

        Ok(Self {
            database_url,
            brokers,
            namespace,
            metrics_addr,
            health_addr,
            probe_timeout,
        })
    }
}

fn parse_addr(key: &str, value: &str) -> Result<SocketAddr, ControllerError> {
    value
        .trim()
        .parse()
        .map_err(|e| ControllerError::InvalidConfig(format!("{key} '{value}' is not a socket address: {e}")))
}
