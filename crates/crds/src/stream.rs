//! StrandStream Custom Resource Definition
//!
//! A logical stream belongs to a tenant and maps onto exactly one broker
//! topic. The topic name is derived from the tenant ID and stream name.

use crate::conditions::StatusCondition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Retention applied when `retentionDays` is zero or unset
pub const DEFAULT_RETENTION_DAYS: i32 = 7;

/// StrandStreamSpec defines the desired state of a stream
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "strand.microscaler.io",
    version = "v1alpha1",
    kind = "StrandStream",
    namespaced,
    status = "StrandStreamStatus",
    shortname = "sts",
    printcolumn = r#"{"name":"Topic","type":"string","jsonPath":".status.topic"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StrandStreamSpec {
    /// Tenant ID (or tenant name) the stream belongs to
    pub tenant_id: String,

    /// Stream name, unique per tenant
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Days to retain messages (0 means the default of 7)
    #[serde(default)]
    pub retention_days: i32,
}

impl StrandStreamSpec {
    /// Retention with the default applied.
    pub fn effective_retention_days(&self) -> i32 {
        if self.retention_days <= 0 {
            DEFAULT_RETENTION_DAYS
        } else {
            self.retention_days
        }
    }
}

/// StrandStreamStatus defines the observed state of a stream
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrandStreamStatus {
    /// Current phase
    #[serde(default)]
    pub phase: StreamPhase,

    /// Database ID of the stream row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,

    /// Broker topic backing the stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Latest observations
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

/// Stream lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum StreamPhase {
    #[default]
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "ready")]
    Ready,
}
