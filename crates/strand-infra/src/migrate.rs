//! Schema migrations
//!
//! Migrations are plain `<version>_<name>.sql` files read from a directory at
//! run time, applied with sqlx's migrator and tracked in `_sqlx_migrations`.

use crate::connection::{normalize_database_url, redact_database_url};
use crate::error::InfraError;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Latest applied migration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationVersion {
    /// Highest recorded version, 0 when nothing has run
    pub version: u64,
    /// Whether the latest migration did not finish successfully
    pub dirty: bool,
}

/// Trait for applying migrations
#[async_trait::async_trait]
pub trait MigrationRunner: Send + Sync {
    /// Apply all pending migrations from `path`. Already-applied ones are skipped.
    async fn run_migrations(&self, database_url: &str, path: &str) -> Result<(), InfraError>;

    /// Report the latest applied version of the migrations in `path`.
    async fn version(&self, database_url: &str, path: &str) -> Result<MigrationVersion, InfraError>;
}

/// sqlx-backed migration runner
#[derive(Debug, Clone)]
pub struct SqlxMigrationRunner {
    connect_timeout: Duration,
}

impl SqlxMigrationRunner {
    /// Create a runner whose connections give up after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn pool(&self, database_url: &str) -> Result<PgPool, InfraError> {
        let url = normalize_database_url(database_url)?;
        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.connect_timeout)
            .connect(&url)
            .await
            .map_err(InfraError::from)
    }
}

impl Default for SqlxMigrationRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait::async_trait]
impl MigrationRunner for SqlxMigrationRunner {
    async fn run_migrations(&self, database_url: &str, path: &str) -> Result<(), InfraError> {
        info!(
            "Running migrations from {} against {}",
            path,
            redact_database_url(database_url)
        );

        let migrator = Migrator::new(Path::new(path)).await?;
        let pool = self.pool(database_url).await?;
        let result = migrator.run(&pool).await;
        pool.close().await;
        result?;

        info!("Migrations from {} applied", path);
        Ok(())
    }

    async fn version(&self, database_url: &str, _path: &str) -> Result<MigrationVersion, InfraError> {
        // Applied versions live in the database; the directory is not consulted.
        let pool = self.pool(database_url).await?;
        let row = sqlx::query_as::<_, (i64, bool)>(
            "SELECT version, success FROM _sqlx_migrations ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&pool)
        .await;
        pool.close().await;

        match row? {
            Some((version, success)) => Ok(MigrationVersion {
                version: u64::try_from(version).unwrap_or_else(|_| {
                    warn!("Negative migration version {} recorded", version);
                    0
                }),
                dirty: !success,
            }),
            None => Ok(MigrationVersion::default()),
        }
    }
}
