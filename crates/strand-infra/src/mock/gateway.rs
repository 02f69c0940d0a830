//! In-memory database gateway

use crate::error::InfraError;
use crate::gateway::{ClientRecord, DatabaseGateway, StreamRecord};
use crate::topic::generate_topic_name;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A user row as the mock stores it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    /// Owning tenant
    pub tenant_id: String,
    /// Login name
    pub username: String,
    /// Plaintext password as passed in
    pub password: String,
}

#[derive(Debug, Clone)]
struct StoredStream {
    id: String,
    topic: String,
    description: String,
    retention_days: i32,
}

/// Mock DatabaseGateway for testing
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    // name -> id
    tenants: Arc<Mutex<HashMap<String, String>>>,
    // (tenant_id, name) -> stream
    streams: Arc<Mutex<HashMap<(String, String), StoredStream>>>,
    // (tenant_id, client_id) -> record
    clients: Arc<Mutex<HashMap<(String, String), (ClientRecord, String)>>>,
    // (tenant_id, username) -> user
    users: Arc<Mutex<HashMap<(String, String), StoredUser>>>,
    failure: Arc<Mutex<Option<String>>>,
    missing_dependency: Arc<Mutex<bool>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tenant row with a fixed ID.
    pub fn add_tenant(&self, name: &str, id: &str) {
        self.tenants.lock().unwrap().insert(name.to_string(), id.to_string());
    }

    /// Make every subsequent call fail with a database-style error.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Make `ensure_client` report a foreign key violation.
    pub fn fail_missing_dependency(&self) {
        *self.missing_dependency.lock().unwrap() = true;
    }

    /// Clear any injected failure.
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
        *self.missing_dependency.lock().unwrap() = false;
    }

    /// Names of the operations called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// ID of the tenant called `name`.
    pub fn tenant_id(&self, name: &str) -> Option<String> {
        self.tenants.lock().unwrap().get(name).cloned()
    }

    /// Number of stored tenants.
    pub fn tenant_count(&self) -> usize {
        self.tenants.lock().unwrap().len()
    }

    /// Number of stored streams.
    pub fn stream_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    /// Description and retention stored for a stream.
    pub fn stream_settings(&self, tenant_id: &str, name: &str) -> Option<(String, i32)> {
        self.streams
            .lock()
            .unwrap()
            .get(&(tenant_id.to_string(), name.to_string()))
            .map(|s| (s.description.clone(), s.retention_days))
    }

    /// Stored client and the secret it was saved with.
    pub fn client(&self, tenant_id: &str, client_id: &str) -> Option<(ClientRecord, String)> {
        self.clients
            .lock()
            .unwrap()
            .get(&(tenant_id.to_string(), client_id.to_string()))
            .cloned()
    }

    /// Stored user.
    pub fn user(&self, tenant_id: &str, username: &str) -> Option<StoredUser> {
        self.users
            .lock()
            .unwrap()
            .get(&(tenant_id.to_string(), username.to_string()))
            .cloned()
    }

    fn record(&self, call: &str) -> Result<(), InfraError> {
        self.calls.lock().unwrap().push(call.to_string());
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(InfraError::Database(sqlx::Error::Protocol(message.clone()))),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DatabaseGateway for MockGateway {
    async fn ensure_tenant(&self, name: &str) -> Result<String, InfraError> {
        self.record("ensure_tenant")?;
        let mut tenants = self.tenants.lock().unwrap();
        Ok(tenants
            .entry(name.to_string())
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone())
    }

    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<String>, InfraError> {
        self.record("find_tenant")?;
        let tenants = self.tenants.lock().unwrap();
        Ok(tenants.values().find(|id| id.as_str() == tenant_id).cloned())
    }

    async fn create_stream(
        &self,
        tenant_id: &str,
        name: &str,
        description: &str,
        retention_days: i32,
    ) -> Result<StreamRecord, InfraError> {
        self.record("create_stream")?;
        let mut streams = self.streams.lock().unwrap();
        let stream = streams
            .entry((tenant_id.to_string(), name.to_string()))
            .or_insert_with(|| StoredStream {
                id: Uuid::new_v4().to_string(),
                topic: generate_topic_name(tenant_id, name),
                description: String::new(),
                retention_days,
            });
        stream.description = description.to_string();
        stream.retention_days = retention_days;
        Ok(StreamRecord {
            id: stream.id.clone(),
            topic: stream.topic.clone(),
        })
    }

    async fn get_stream(&self, tenant_id: &str, name: &str) -> Result<StreamRecord, InfraError> {
        self.record("get_stream")?;
        self.streams
            .lock()
            .unwrap()
            .get(&(tenant_id.to_string(), name.to_string()))
            .map(|s| StreamRecord {
                id: s.id.clone(),
                topic: s.topic.clone(),
            })
            .ok_or_else(|| InfraError::NotFound(format!("stream {name} for tenant {tenant_id}")))
    }

    async fn ensure_client(
        &self,
        tenant_id: &str,
        client_id: &str,
        secret: &str,
        stream_id: Option<&str>,
    ) -> Result<ClientRecord, InfraError> {
        self.record("ensure_client")?;
        if *self.missing_dependency.lock().unwrap() {
            return Err(InfraError::MissingDependency(format!(
                "client tenant or stream does not exist: tenant {tenant_id}"
            )));
        }

        let mut clients = self.clients.lock().unwrap();
        let key = (tenant_id.to_string(), client_id.to_string());
        let id = clients
            .get(&key)
            .map_or_else(|| Uuid::new_v4().to_string(), |(record, _)| record.id.clone());
        let record = ClientRecord {
            id,
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            stream_id: stream_id.map(str::to_string),
        };
        clients.insert(key, (record.clone(), secret.to_string()));
        Ok(record)
    }

    async fn ensure_user(&self, tenant_id: &str, username: &str, password: &str) -> Result<(), InfraError> {
        self.record("ensure_user")?;
        self.users.lock().unwrap().insert(
            (tenant_id.to_string(), username.to_string()),
            StoredUser {
                tenant_id: tenant_id.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            },
        );
        Ok(())
    }
}
