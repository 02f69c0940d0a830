//! Scripted migration runner

use crate::error::InfraError;
use crate::migrate::{MigrationRunner, MigrationVersion};
use std::sync::{Arc, Mutex};

/// Mock MigrationRunner that records runs and reports a fixed version
#[derive(Debug, Clone, Default)]
pub struct MockMigrationRunner {
    runs: Arc<Mutex<Vec<(String, String)>>>,
    version: Arc<Mutex<MigrationVersion>>,
    run_failure: Arc<Mutex<Option<String>>>,
    version_failure: Arc<Mutex<Option<String>>>,
}

impl MockMigrationRunner {
    /// Create a runner that succeeds and reports version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Version reported after a run.
    pub fn set_version(&self, version: u64, dirty: bool) {
        *self.version.lock().unwrap() = MigrationVersion { version, dirty };
    }

    /// Make `run_migrations` fail.
    pub fn fail_run(&self, message: &str) {
        *self.run_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Make `version` fail.
    pub fn fail_version(&self, message: &str) {
        *self.version_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Clear any injected failure.
    pub fn recover(&self) {
        *self.run_failure.lock().unwrap() = None;
        *self.version_failure.lock().unwrap() = None;
    }

    /// (database URL, path) of each run.
    pub fn runs(&self) -> Vec<(String, String)> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MigrationRunner for MockMigrationRunner {
    async fn run_migrations(&self, database_url: &str, path: &str) -> Result<(), InfraError> {
        self.runs
            .lock()
            .unwrap()
            .push((database_url.to_string(), path.to_string()));
        match self.run_failure.lock().unwrap().as_ref() {
            Some(message) => Err(InfraError::Database(sqlx::Error::Protocol(message.clone()))),
            None => Ok(()),
        }
    }

    async fn version(&self, _database_url: &str, _path: &str) -> Result<MigrationVersion, InfraError> {
        match self.version_failure.lock().unwrap().as_ref() {
            Some(message) => Err(InfraError::Database(sqlx::Error::Protocol(message.clone()))),
            None => Ok(*self.version.lock().unwrap()),
        }
    }
}
