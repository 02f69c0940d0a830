//! StrandUser Custom Resource Definition
//!
//! Users authenticate with basic auth. The password is surfaced once through
//! `status.password` and kept in the companion Secret `strand-user-<username>`.

use crate::conditions::StatusCondition;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// StrandUserSpec defines the desired state of a user
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "strand.microscaler.io",
    version = "v1alpha1",
    kind = "StrandUser",
    namespaced,
    status = "StrandUserStatus",
    shortname = "stu",
    printcolumn = r#"{"name":"Username","type":"string","jsonPath":".spec.username"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StrandUserSpec {
    /// Login name
    pub username: String,

    /// Explicit password. Generated when empty; clearing it requests a reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Tenant ID the user belongs to
    pub tenant_id: String,

    /// Role names granted to the user
    #[serde(default)]
    pub roles: Vec<String>,
}

impl StrandUserSpec {
    /// The explicit password, treating an empty string as unset.
    pub fn explicit_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

/// StrandUserStatus defines the observed state of a user
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrandUserStatus {
    /// Current phase
    #[serde(default)]
    pub phase: UserPhase,

    /// Password shown once after creation. Never overwritten once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Whether the password was generated by the controller
    #[serde(default)]
    pub password_generated: bool,

    /// When the password was last reset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_password_reset: Option<DateTime<Utc>>,

    /// Latest observations
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

impl StrandUserStatus {
    /// The surfaced password, if one has been set.
    pub fn surfaced_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

/// User lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum UserPhase {
    #[default]
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "error")]
    Error,
}
