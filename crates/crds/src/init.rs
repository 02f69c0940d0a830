//! StrandInit Custom Resource Definition
//!
//! Runs database migrations against the data plane and waits for the
//! gateway Deployments that depend on the schema to become available.

use crate::conditions::StatusCondition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Migrations directory used when `migrationsPath` is unset
pub const DEFAULT_MIGRATIONS_PATH: &str = "/migrations";

/// StrandInitSpec defines the desired initialization
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "strand.microscaler.io",
    version = "v1alpha1",
    kind = "StrandInit",
    namespaced,
    status = "StrandInitStatus",
    shortname = "sti",
    printcolumn = r#"{"name":"Version","type":"integer","jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"Dirty","type":"boolean","jsonPath":".status.dirty"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StrandInitSpec {
    /// Path to the migration files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations_path: Option<String>,

    /// Database URL. Built from the StrandDataPlane when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Gateway Deployments to wait for after migrating
    #[serde(default)]
    pub gateways: Vec<String>,
}

impl StrandInitSpec {
    /// Migrations path with the default applied.
    pub fn effective_migrations_path(&self) -> &str {
        self.migrations_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_MIGRATIONS_PATH)
    }

    /// Explicit database URL, treating an empty string as unset.
    pub fn explicit_database_url(&self) -> Option<&str> {
        self.database_url.as_deref().filter(|u| !u.is_empty())
    }
}

/// StrandInitStatus defines the observed initialization state
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrandInitStatus {
    /// Current phase
    #[serde(default)]
    pub phase: InitPhase,

    /// Applied schema version
    #[serde(default)]
    pub version: u64,

    /// Whether the last migration failed part-way
    #[serde(default)]
    pub dirty: bool,

    /// Latest observations
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

/// Init lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum InitPhase {
    #[default]
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "initialized")]
    Initialized,
    #[serde(alias = "failed")]
    Failed,
}
