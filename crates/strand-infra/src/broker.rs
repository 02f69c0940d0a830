//! Broker administration
//!
//! Topic creation against a Kafka-compatible broker (Redpanda in the default
//! deployment). Creation is idempotent: an existing topic is success.

use crate::error::InfraError;
use rskafka::client::error::{Error as KafkaError, ProtocolError};
use rskafka::client::ClientBuilder;
use std::time::Duration;
use tracing::{debug, info};

/// Partition count for stream topics
pub const DEFAULT_PARTITIONS: i32 = 1;
/// Replication factor for stream topics
pub const DEFAULT_REPLICATION_FACTOR: i16 = 1;

/// Trait for broker admin operations
#[async_trait::async_trait]
pub trait BrokerAdmin: Send + Sync {
    /// Create `topic` unless it already exists.
    async fn create_topic(&self, topic: &str) -> Result<(), InfraError>;
}

/// Parse a comma-separated bootstrap list, dropping empty entries.
pub fn parse_brokers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// rskafka-backed broker admin
#[derive(Debug, Clone)]
pub struct KafkaBrokerAdmin {
    brokers: Vec<String>,
    partitions: i32,
    replication_factor: i16,
    timeout: Duration,
}

impl KafkaBrokerAdmin {
    /// Create an admin for the given bootstrap brokers.
    pub fn new(brokers: Vec<String>, timeout: Duration) -> Result<Self, InfraError> {
        if brokers.is_empty() {
            return Err(InfraError::Broker("no brokers configured".to_string()));
        }
        Ok(Self {
            brokers,
            partitions: DEFAULT_PARTITIONS,
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl BrokerAdmin for KafkaBrokerAdmin {
    async fn create_topic(&self, topic: &str) -> Result<(), InfraError> {
        let client = tokio::time::timeout(self.timeout, ClientBuilder::new(self.brokers.clone()).build())
            .await
            .map_err(|_| InfraError::Timeout(format!("connecting to brokers {}", self.brokers.join(","))))?
            .map_err(|e| InfraError::Broker(format!("failed to connect to brokers: {e}")))?;

        let controller = client
            .controller_client()
            .map_err(|e| InfraError::Broker(format!("failed to get controller client: {e}")))?;

        let timeout_ms = i32::try_from(self.timeout.as_millis()).unwrap_or(i32::MAX);
        match controller
            .create_topic(topic, self.partitions, self.replication_factor, timeout_ms)
            .await
        {
            Ok(()) => {
                info!(
                    "Created topic {} ({} partitions, replication {})",
                    topic, self.partitions, self.replication_factor
                );
                Ok(())
            }
            Err(KafkaError::ServerError {
                protocol_error: ProtocolError::TopicAlreadyExists,
                ..
            }) => {
                debug!("Topic {} already exists", topic);
                Ok(())
            }
            Err(e) => Err(InfraError::Broker(format!("failed to create topic {topic}: {e}"))),
        }
    }
}
