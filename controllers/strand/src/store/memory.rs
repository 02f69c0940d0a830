//! In-memory object store for unit tests

use super::{ObjectStore, StoreError};
use async_trait::async_trait;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Key = (String, String);

/// Mock ObjectStore keyed by (namespace, name)
///
/// Status patches follow JSON merge patch semantics, so a `null` field in a
/// patch removes it, as it does against the API server.
#[derive(Debug)]
pub struct MemoryStore<K> {
    objects: Arc<Mutex<BTreeMap<Key, K>>>,
    status_writes: Arc<AtomicUsize>,
    failing_deletes: Arc<Mutex<HashSet<String>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl<K> Clone for MemoryStore<K> {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
            status_writes: Arc::clone(&self.status_writes),
            failing_deletes: Arc::clone(&self.failing_deletes),
            failure: Arc::clone(&self.failure),
        }
    }
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            status_writes: Arc::new(AtomicUsize::new(0)),
            failing_deletes: Arc::new(Mutex::new(HashSet::new())),
            failure: Arc::new(Mutex::new(None)),
        }
    }
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing create semantics.
    pub fn insert(&self, object: K) {
        let meta = object.meta();
        let key = (
            meta.namespace.clone().unwrap_or_else(|| "default".to_string()),
            meta.name.clone().unwrap_or_default(),
        );
        self.objects.lock().unwrap().insert(key, object);
    }

    pub fn snapshot(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Number of status patches applied so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    /// Make deletes of `name` fail.
    pub fn fail_delete(&self, name: &str) {
        self.failing_deletes.lock().unwrap().insert(name.to_string());
    }

    /// Make every call fail.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    fn check(&self) -> Result<(), StoreError> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(StoreError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

/// RFC 7386 merge of `patch` into `target`
fn merge(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(fields) => {
            if !target.is_object() {
                *target = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(existing) = target {
                for (key, value) in fields {
                    if value.is_null() {
                        existing.remove(key);
                    } else {
                        merge(existing.entry(key.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        self.check()?;
        Ok(self.snapshot(namespace, name))
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        self.check()?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|wanted| wanted == ns))
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        self.check()?;
        let name = object.meta().name.clone().unwrap_or_default();
        let key = (namespace.to_string(), name.clone());
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("{namespace}/{name}")));
        }
        let mut created = object.clone();
        created.meta_mut().namespace = Some(namespace.to_string());
        created.meta_mut().uid = Some(uuid::Uuid::new_v4().to_string());
        objects.insert(key, created.clone());
        Ok(created)
    }

    async fn replace(&self, namespace: &str, name: &str, object: &K) -> Result<K, StoreError> {
        self.check()?;
        let key = (namespace.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        if !objects.contains_key(&key) {
            return Err(StoreError::NotFound(format!("{namespace}/{name}")));
        }
        objects.insert(key, object.clone());
        Ok(object.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.check()?;
        if self.failing_deletes.lock().unwrap().contains(name) {
            return Err(StoreError::Rejected(format!("delete of {namespace}/{name} refused")));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn patch_status(&self, namespace: &str, name: &str, status: Value) -> Result<(), StoreError> {
        self.check()?;
        let key = (namespace.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("{namespace}/{name}")))?;

        let mut value = serde_json::to_value(object)?;
        merge(&mut value, &serde_json::json!({ "status": status }));
        objects.insert(key, serde_json::from_value(value)?);
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_removes_null_fields() {
        let mut target = json!({"status": {"password": "x", "phase": "Active"}});
        merge(&mut target, &json!({"status": {"password": null, "phase": "Pending"}}));
        assert_eq!(target, json!({"status": {"phase": "Pending"}}));
    }

    #[test]
    fn test_merge_replaces_arrays() {
        let mut target = json!({"status": {"conditions": [1, 2]}});
        merge(&mut target, &json!({"status": {"conditions": [3]}}));
        assert_eq!(target, json!({"status": {"conditions": [3]}}));
    }
}
