//! Reconciliation logic for Strand CRDs.
//!
//! One reconciler per kind. Each is constructed with the stores and
//! infrastructure clients it needs and driven by the watcher through the
//! [`Reconcile`] trait:
//! - `tenant`: StrandTenant → `tenants` row
//! - `stream`: StrandStream → `streams` row and broker topic
//! - `client`: StrandClient → `clients` row and companion Secret
//! - `user`: StrandUser → `users` row, companion Secret and password reset
//! - `data_plane`: StrandDataPlane → connectivity report
//! - `init`: StrandInit → schema migrations and gateway readiness
//! - `auth_config`: StrandAuthConfig → auth mode transitions

pub mod auth_config;
pub mod client;
pub mod data_plane;
pub mod init;
pub mod stream;
#[cfg(test)]
mod stream_test;
pub mod tenant;
pub mod user;
#[cfg(test)]
mod user_test;

pub use auth_config::AuthConfigReconciler;
pub use client::ClientReconciler;
pub use data_plane::DataPlaneReconciler;
pub use init::InitReconciler;
pub use stream::StreamReconciler;
pub use tenant::TenantReconciler;
pub use user::UserReconciler;

use crate::error::ControllerError;
use crate::store::{ObjectStore, StoreError};
use async_trait::async_trait;
use crds::{StatusCondition, CONDITION_READY};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::Resource;
use kube_runtime::controller::Action;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Requeue delay while the database gateway is not configured
pub const INFRASTRUCTURE_REQUEUE: Duration = Duration::from_secs(5);
/// Requeue delay for dependency and infrastructure failures handled in-band
pub const DEPENDENCY_REQUEUE: Duration = Duration::from_secs(30);
/// Requeue delay while gateway Deployments come up
pub const GATEWAY_REQUEUE: Duration = Duration::from_secs(10);

/// Value of `app.kubernetes.io/managed-by` on objects the controller creates
pub const MANAGED_BY: &str = "strand-controller";

/// Namespace and name of the object being reconciled
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key for a watched object. Objects without a namespace land in "default".
    pub fn from_resource<K: Resource>(object: &K) -> Result<Self, ControllerError> {
        let meta = object.meta();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| ControllerError::InvalidConfig("object is missing metadata.name".to_string()))?;
        let namespace = meta.namespace.clone().unwrap_or_else(|| "default".to_string());
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A reconciler for one kind
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    /// Kind name used in logs and metric labels
    fn kind(&self) -> &'static str;

    /// Drive the object at `key` toward its desired state.
    ///
    /// A missing object is not an error: the reconciler returns
    /// `Action::await_change()`.
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ControllerError>;
}

/// Patch `desired` into the status subresource unless it equals `current`.
///
/// Returns whether a write happened.
pub(crate) async fn write_status<K, S>(
    store: &dyn ObjectStore<K>,
    key: &ObjectKey,
    current: Option<&S>,
    desired: &S,
) -> Result<bool, StoreError>
where
    K: Send + Sync + 'static,
    S: Serialize + PartialEq,
{
    if current == Some(desired) {
        debug!("Status of {} unchanged, skipping update", key);
        return Ok(false);
    }
    store
        .patch_status(&key.namespace, &key.name, serde_json::to_value(desired)?)
        .await?;
    Ok(true)
}

/// `Ready=False` while the database gateway is not configured
pub(crate) fn infrastructure_not_ready() -> StatusCondition {
    StatusCondition::falsy(
        CONDITION_READY,
        "InfrastructureNotReady",
        "Waiting for database connection",
    )
}

/// Controller owner reference pointing at `owner`
pub(crate) fn owner_reference<K>(owner: &K) -> OwnerReference
where
    K: Resource<DynamicType = ()>,
{
    let meta = owner.meta();
    OwnerReference {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
        name: meta.name.clone().unwrap_or_default(),
        uid: meta.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Read a UTF-8 value from a Secret's data.
pub(crate) fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
        .filter(|value| !value.is_empty())
}

/// Labels stamped on every companion Secret
fn managed_secret_labels() -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/managed-by".to_string(), MANAGED_BY.to_string());
    labels.insert("app.kubernetes.io/part-of".to_string(), "strand".to_string());
    labels
}

/// The owner reference marked as controller, if any
pub(crate) fn controller_owner(secret: &Secret) -> Option<&OwnerReference> {
    secret
        .metadata
        .owner_references
        .as_ref()
        .and_then(|refs| refs.iter().find(|r| r.controller == Some(true)))
}

/// Point `meta` at `owner`, dropping any other controller reference and
/// adding the managed labels. Returns whether anything changed.
fn adopt_secret(meta: &mut ObjectMeta, owner: OwnerReference) -> bool {
    let mut changed = false;

    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    let before = refs.len();
    refs.retain(|r| r.controller != Some(true) || r.uid == owner.uid);
    changed |= refs.len() != before;
    if !refs.iter().any(|r| r.uid == owner.uid) {
        refs.push(owner);
        changed = true;
    }

    let labels = meta.labels.get_or_insert_with(BTreeMap::new);
    for (k, v) in managed_secret_labels() {
        if labels.get(&k) != Some(&v) {
            labels.insert(k, v);
            changed = true;
        }
    }
    changed
}

/// Create the companion Secret, or update it when its data or ownership differs.
///
/// An existing Secret left behind by a deleted object of the same name is
/// re-pointed at `owner` so garbage collection of the old object spares it.
pub(crate) async fn upsert_secret(
    secrets: &dyn ObjectStore<Secret>,
    namespace: &str,
    name: &str,
    values: BTreeMap<String, String>,
    owner: OwnerReference,
    existing: Option<Secret>,
) -> Result<(), StoreError> {
    let data: BTreeMap<String, ByteString> = values
        .into_iter()
        .map(|(k, v)| (k, ByteString(v.into_bytes())))
        .collect();

    match existing {
        Some(mut secret) => {
            let adopted = adopt_secret(&mut secret.metadata, owner);
            if !adopted && secret.data.as_ref() == Some(&data) {
                debug!("Secret {}/{} up to date", namespace, name);
                return Ok(());
            }
            secret.data = Some(data);
            secret.string_data = None;
            secrets.replace(namespace, name, &secret).await?;
            debug!("Updated Secret {}/{}", namespace, name);
        }
        None => {
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    labels: Some(managed_secret_labels()),
                    owner_references: Some(vec![owner]),
                    ..Default::default()
                },
                data: Some(data),
                type_: Some("Opaque".to_string()),
                ..Default::default()
            };
            secrets.create(namespace, &secret).await?;
            debug!("Created Secret {}/{}", namespace, name);
        }
    }
    Ok(())
}
