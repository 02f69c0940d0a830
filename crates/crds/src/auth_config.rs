//! StrandAuthConfig Custom Resource Definition
//!
//! Selects how gateways authenticate callers. Moving away from basic auth
//! removes every StrandUser, since their passwords no longer apply.

use crate::conditions::StatusCondition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// StrandAuthConfigSpec defines the desired authentication mode
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "strand.microscaler.io",
    version = "v1alpha1",
    kind = "StrandAuthConfig",
    namespaced,
    status = "StrandAuthConfigStatus",
    shortname = "stac",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StrandAuthConfigSpec {
    /// Authentication type
    #[serde(rename = "type")]
    pub type_: AuthType,

    /// OIDC settings (required when type is oidc)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_config: Option<OidcConfig>,
}

/// Authentication type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    Basic,
    Oidc,
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => f.write_str("basic"),
            Self::Oidc => f.write_str("oidc"),
        }
    }
}

/// OIDC provider settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfig {
    /// Issuer URL
    pub issuer_url: String,

    /// OIDC client ID
    pub client_id: String,

    /// Secret holding the OIDC client secret
    pub client_secret_ref: String,

    /// Scopes to request
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// StrandAuthConfigStatus defines the observed authentication mode
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrandAuthConfigStatus {
    /// Current phase
    #[serde(default)]
    pub phase: AuthConfigPhase,

    /// Type applied by the last reconcile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_type: Option<AuthType>,

    /// Latest observations
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

/// AuthConfig phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum AuthConfigPhase {
    #[default]
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "active")]
    Active,
}
