//! Scripted connectivity probe

use crate::error::InfraError;
use crate::probe::ConnectivityProbe;
use std::sync::{Arc, Mutex};

/// Mock ConnectivityProbe with per-component outcomes
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    database_error: Arc<Mutex<Option<String>>>,
    broker_error: Arc<Mutex<Option<String>>>,
}

impl MockProbe {
    /// Create a probe where everything is reachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the database probe fail.
    pub fn fail_database(&self, message: &str) {
        *self.database_error.lock().unwrap() = Some(message.to_string());
    }

    /// Make the broker probe fail.
    pub fn fail_brokers(&self, message: &str) {
        *self.broker_error.lock().unwrap() = Some(message.to_string());
    }

    /// Make both probes succeed again.
    pub fn recover(&self) {
        *self.database_error.lock().unwrap() = None;
        *self.broker_error.lock().unwrap() = None;
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for MockProbe {
    async fn probe_database(&self, _host: &str, _port: u16) -> Result<(), InfraError> {
        match self.database_error.lock().unwrap().as_ref() {
            Some(message) => Err(InfraError::Unreachable(message.clone())),
            None => Ok(()),
        }
    }

    async fn probe_brokers(&self, _brokers: &[String], _tls_enabled: bool) -> Result<(), InfraError> {
        match self.broker_error.lock().unwrap().as_ref() {
            Some(message) => Err(InfraError::Unreachable(message.clone())),
            None => Ok(()),
        }
    }
}
