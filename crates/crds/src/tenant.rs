//! StrandTenant Custom Resource Definition
//!
//! A tenant owns streams, users and client credentials. The controller
//! mirrors it into the `tenants` table and records the row ID in status.

use crate::conditions::StatusCondition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// StrandTenantSpec defines the desired state of a tenant
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "strand.microscaler.io",
    version = "v1alpha1",
    kind = "StrandTenant",
    namespaced,
    status = "StrandTenantStatus",
    shortname = "stt",
    printcolumn = r#"{"name":"ID","type":"string","jsonPath":".status.id"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StrandTenantSpec {
    /// Display name of the tenant (defaults to the object name)
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Billing plan. Only used when the tenant row is first created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

/// StrandTenantStatus defines the observed state of a tenant
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrandTenantStatus {
    /// Database ID of the tenant row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Current phase
    #[serde(default)]
    pub phase: TenantPhase,

    /// Latest observations
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

/// Tenant lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum TenantPhase {
    #[default]
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "ready")]
    Ready,
}
