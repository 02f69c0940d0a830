//! Connectivity probes for data plane components

use crate::error::InfraError;
use rskafka::client::ClientBuilder;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Trait for reachability checks
#[async_trait::async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Check that the database accepts TCP connections.
    async fn probe_database(&self, host: &str, port: u16) -> Result<(), InfraError>;

    /// Check that at least one broker answers.
    async fn probe_brokers(&self, brokers: &[String], tls_enabled: bool) -> Result<(), InfraError>;
}

/// Probe over the network with a fixed per-attempt timeout
#[derive(Debug, Clone, Copy)]
pub struct NetworkProbe {
    timeout: Duration,
}

impl NetworkProbe {
    /// Create a probe that gives up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn tcp_connect(&self, address: &str) -> Result<(), InfraError> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(address)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(InfraError::Unreachable(format!("{address}: {e}"))),
            Err(_) => Err(InfraError::Timeout(format!("connecting to {address}"))),
        }
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for NetworkProbe {
    async fn probe_database(&self, host: &str, port: u16) -> Result<(), InfraError> {
        let address = format!("{host}:{port}");
        debug!("Probing database at {}", address);
        self.tcp_connect(&address).await
    }

    async fn probe_brokers(&self, brokers: &[String], tls_enabled: bool) -> Result<(), InfraError> {
        if brokers.is_empty() {
            return Err(InfraError::Broker("no brokers configured".to_string()));
        }

        // Without TLS material the Kafka handshake cannot complete; reachability is all we can check.
        if tls_enabled {
            let mut last_error = None;
            for broker in brokers {
                match self.tcp_connect(broker).await {
                    Ok(()) => return Ok(()),
                    Err(e) => last_error = Some(e),
                }
            }
            return Err(last_error.unwrap_or_else(|| InfraError::Unreachable("no broker reachable".to_string())));
        }

        debug!("Probing brokers {}", brokers.join(","));
        match tokio::time::timeout(self.timeout, ClientBuilder::new(brokers.to_vec()).build()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(InfraError::Unreachable(e.to_string())),
            Err(_) => Err(InfraError::Timeout(format!("connecting to brokers {}", brokers.join(",")))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_database_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = NetworkProbe::new(Duration::from_secs(2));
        assert!(probe.probe_database("127.0.0.1", port).await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_database_fails_on_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = NetworkProbe::new(Duration::from_secs(2));
        assert!(probe.probe_database("127.0.0.1", port).await.is_err());
    }

    #[tokio::test]
    async fn test_probe_brokers_rejects_empty_list() {
        let probe = NetworkProbe::new(Duration::from_secs(1));
        assert!(matches!(
            probe.probe_brokers(&[], false).await,
            Err(InfraError::Broker(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_brokers_tls_uses_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let probe = NetworkProbe::new(Duration::from_secs(2));
        assert!(probe.probe_brokers(&[address], true).await.is_ok());
    }
}
