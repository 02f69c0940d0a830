//! StrandClient Custom Resource Definition
//!
//! A client credential grants an application access to a tenant (optionally
//! scoped to one stream). The secret is stored in a companion Kubernetes
//! Secret named `strand-client-<name>`.

use crate::conditions::StatusCondition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// StrandClientSpec defines the desired state of a client credential
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "strand.microscaler.io",
    version = "v1alpha1",
    kind = "StrandClient",
    namespaced,
    status = "StrandClientStatus",
    shortname = "stc",
    printcolumn = r#"{"name":"Client","type":"string","jsonPath":".spec.clientId"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StrandClientSpec {
    /// Tenant ID the client belongs to
    pub tenant_id: String,

    /// Client ID presented by the application
    pub client_id: String,

    /// Stream ID to scope this client to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,

    /// Explicit client secret. Generated when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl StrandClientSpec {
    /// The explicit secret, treating an empty string as unset.
    pub fn explicit_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }

    /// The stream scope, treating an empty string as unset.
    pub fn stream_scope(&self) -> Option<&str> {
        self.stream_id.as_deref().filter(|s| !s.is_empty())
    }
}

/// StrandClientStatus defines the observed state of a client credential
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrandClientStatus {
    /// Database ID of the client credential row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Current phase
    #[serde(default)]
    pub phase: ClientPhase,

    /// Whether the secret was generated by the controller
    #[serde(default)]
    pub secret_generated: bool,

    /// Latest observations
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

/// Client credential lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ClientPhase {
    #[default]
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "ready")]
    Ready,
    #[serde(alias = "error")]
    Error,
}
