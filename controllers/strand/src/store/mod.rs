//! Object store seam over the Kubernetes API.
//!
//! Reconcilers never hold a `kube::Api` directly. They talk to an
//! [`ObjectStore`], which the binary backs with [`KubeStore`] and the unit
//! tests back with an in-memory store.

use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
mod memory;
#[cfg(test)]
pub use memory::MemoryStore;

/// Errors returned by an [`ObjectStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object could not be converted to or from JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Create collided with an existing object
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// Object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Request was refused by the store
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// CRUD plus status patching for one namespaced kind.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch an object, `None` when it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// List objects in `namespace`, or in the whole watch scope when `None`.
    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError>;

    /// Create an object.
    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Replace an existing object.
    async fn replace(&self, namespace: &str, name: &str, object: &K) -> Result<K, StoreError>;

    /// Delete an object. Deleting something already gone is not an error.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Merge-patch the status subresource with `status`.
    async fn patch_status(&self, namespace: &str, name: &str, status: serde_json::Value) -> Result<(), StoreError>;
}

/// [`ObjectStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    /// Namespace that lists are confined to, all namespaces when `None`
    scope: Option<String>,
}

impl KubeStore {
    /// Create a store. `scope` limits cross-namespace lists.
    pub fn new(client: Client, scope: Option<String>) -> Self {
        Self { client, scope }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").field("scope", &self.scope).finish_non_exhaustive()
    }
}

fn classify(err: kube::Error, what: &str) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(what.to_string()),
        kube::Error::Api(ae) if ae.code == 409 => StoreError::AlreadyExists(what.to_string()),
        kube::Error::Api(ae) if ae.code == 422 => StoreError::Rejected(format!("{what}: {}", ae.message)),
        other => StoreError::Kube(other),
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        Ok(self.namespaced::<K>(namespace).get_opt(name).await?)
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let api: Api<K> = match namespace.or(self.scope.as_deref()) {
            Some(ns) => self.namespaced(ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let what = format!("{}/{}", namespace, object.meta().name.as_deref().unwrap_or_default());
        self.namespaced::<K>(namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| classify(e, &what))
    }

    async fn replace(&self, namespace: &str, name: &str, object: &K) -> Result<K, StoreError> {
        self.namespaced::<K>(namespace)
            .replace(name, &PostParams::default(), object)
            .await
            .map_err(|e| classify(e, &format!("{namespace}/{name}")))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        match self.namespaced::<K>(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!("{}/{} already deleted", namespace, name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_status(&self, namespace: &str, name: &str, status: serde_json::Value) -> Result<(), StoreError> {
        let patch = serde_json::json!({ "status": status });
        self.namespaced::<K>(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify(e, &format!("{namespace}/{name}")))?;
        Ok(())
    }
}
