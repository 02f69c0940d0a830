//! StrandDataPlane Custom Resource Definition
//!
//! Describes the shared database and broker every tenant runs on. One
//! data plane is expected per cluster.

use crate::conditions::StatusCondition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// StrandDataPlaneSpec defines the connection details of the data plane
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "strand.microscaler.io",
    version = "v1alpha1",
    kind = "StrandDataPlane",
    namespaced,
    status = "StrandDataPlaneStatus",
    shortname = "stdp",
    printcolumn = r#"{"name":"Database","type":"boolean","jsonPath":".status.postgresConnected"}"#,
    printcolumn = r#"{"name":"Broker","type":"boolean","jsonPath":".status.brokerConnected"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StrandDataPlaneSpec {
    /// Postgres-compatible database configuration
    pub postgres_config: DatabaseConfig,

    /// Kafka-compatible broker configuration
    pub broker_config: BrokerConfig,
}

/// Postgres-compatible database configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Database host
    pub host: String,

    /// Database port (0 means the default for `type`)
    #[serde(default)]
    pub port: u16,

    /// Database name
    pub database: String,

    /// Database user
    pub user: String,

    /// Name of a Secret holding the password under the `password` key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_ref: Option<String>,

    /// SSL mode (require, disable, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<String>,

    /// Database flavour
    #[serde(default, rename = "type")]
    pub type_: DatabaseType,
}

impl DatabaseConfig {
    /// Port with the flavour default applied.
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 { self.type_.default_port() } else { self.port }
    }
}

/// Supported database flavours
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    Postgres,
    Cockroachdb,
}

impl DatabaseType {
    /// URL scheme used in connection strings.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Cockroachdb => "cockroachdb",
        }
    }

    /// Default listening port.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Cockroachdb => 26257,
        }
    }
}

/// Kafka-compatible broker configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    /// Broker addresses (host:port)
    pub brokers: Vec<String>,

    /// Whether brokers expect TLS
    #[serde(default)]
    pub tls_enabled: bool,

    /// Secret holding TLS material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config_ref: Option<String>,
}

/// StrandDataPlaneStatus defines the observed health of the data plane
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrandDataPlaneStatus {
    /// Current phase
    #[serde(default)]
    pub phase: DataPlanePhase,

    /// Whether the database answered the last probe
    #[serde(default)]
    pub postgres_connected: bool,

    /// Whether a broker answered the last probe
    #[serde(default)]
    pub broker_connected: bool,

    /// Non-fatal connectivity warnings
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Latest observations
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

/// Data plane phase. Probes never block acceptance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum DataPlanePhase {
    #[default]
    #[serde(alias = "active")]
    Active,
}
