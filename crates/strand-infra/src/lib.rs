//! Strand infrastructure clients
//!
//! The pieces of the control plane that talk to something outside
//! Kubernetes: the control-plane database, the Kafka-compatible broker, the
//! migration engine and plain TCP endpoints. Each is exposed as a trait with a
//! production implementation and, behind the `test-util` feature, an
//! in-memory mock.
//!
//! # Example
//!
//! ```no_run
//! use strand_infra::{DatabaseGateway, PgGateway};
//!
//! # async fn example() -> Result<(), strand_infra::InfraError> {
//! let gateway = PgGateway::connect_lazy("postgres://root@localhost:26257/stranddb?sslmode=disable")?;
//! let tenant_id = gateway.ensure_tenant("acme").await?;
//! let stream = gateway.create_stream(&tenant_id, "orders", "", 7).await?;
//! println!("topic: {}", stream.topic);
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod migrate;
pub mod probe;
pub mod secrets;
pub mod topic;
#[cfg(feature = "test-util")]
pub mod mock;

pub use broker::{parse_brokers, BrokerAdmin, KafkaBrokerAdmin};
pub use connection::{build_database_url, normalize_database_url, redact_database_url, ConnectionParts};
pub use error::InfraError;
pub use gateway::{ClientRecord, DatabaseGateway, PgGateway, StreamRecord};
pub use migrate::{MigrationRunner, MigrationVersion, SqlxMigrationRunner};
pub use probe::{ConnectivityProbe, NetworkProbe};
pub use secrets::{hash_password, verify_password, PasswordGenerator, RandomPasswordGenerator};
pub use topic::generate_topic_name;
#[cfg(feature = "test-util")]
pub use mock::{MockBrokerAdmin, MockGateway, MockMigrationRunner, MockProbe, SequencePasswordGenerator};
