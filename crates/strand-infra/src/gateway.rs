//! Database gateway
//!
//! A typed façade over the control-plane tables. Every write is an upsert or
//! a check-then-insert guarded by a unique key, so concurrent reconcilers of
//! different kinds can call it in any order.

use crate::connection::{normalize_database_url, redact_database_url};
use crate::error::{classify, InfraError};
use crate::secrets::{hash_password, verify_password};
use crate::topic::generate_topic_name;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Plan assigned to tenants created by the controller
pub const DEFAULT_TENANT_PLAN: &str = "free";

/// A persisted client credential
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ClientRecord {
    /// Row ID
    pub id: String,
    /// Owning tenant
    pub tenant_id: String,
    /// Client ID presented by applications
    pub client_id: String,
    /// Stream the client is scoped to
    pub stream_id: Option<String>,
}

/// A persisted stream
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StreamRecord {
    /// Row ID
    pub id: String,
    /// Broker topic
    pub topic: String,
}

/// Trait for control-plane database operations
///
/// This trait enables mocking of database calls for unit testing.
#[async_trait::async_trait]
pub trait DatabaseGateway: Send + Sync {
    /// Return the ID of the non-deleted tenant called `name`, inserting it if absent.
    async fn ensure_tenant(&self, name: &str) -> Result<String, InfraError>;

    /// Return `Some(id)` when a non-deleted tenant with this ID exists.
    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<String>, InfraError>;

    /// Upsert a stream keyed by (tenant, name) and return its ID and topic.
    ///
    /// On conflict only the description and retention change; the stored
    /// topic is returned as-is.
    async fn create_stream(
        &self,
        tenant_id: &str,
        name: &str,
        description: &str,
        retention_days: i32,
    ) -> Result<StreamRecord, InfraError>;

    /// Look up a non-deleted stream by (tenant, name).
    async fn get_stream(&self, tenant_id: &str, name: &str) -> Result<StreamRecord, InfraError>;

    /// Upsert a client credential keyed by (tenant, client ID).
    ///
    /// A missing tenant or stream row yields [`InfraError::MissingDependency`].
    async fn ensure_client(
        &self,
        tenant_id: &str,
        client_id: &str,
        secret: &str,
        stream_id: Option<&str>,
    ) -> Result<ClientRecord, InfraError>;

    /// Upsert a user keyed by (tenant, username), storing an argon2 hash of the password.
    async fn ensure_user(&self, tenant_id: &str, username: &str, password: &str) -> Result<(), InfraError>;
}

/// Postgres-backed gateway
#[derive(Debug, Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    /// Create a gateway with a lazily connected pool.
    ///
    /// No connection is made until the first query, so a database that is
    /// still starting does not block controller startup.
    pub fn connect_lazy(database_url: &str) -> Result<Self, InfraError> {
        let url = normalize_database_url(database_url)?;
        let options = PgConnectOptions::from_str(&url)
            .map_err(|e| InfraError::InvalidUrl(format!("{}: {e}", redact_database_url(database_url))))?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(5)
            .idle_timeout(Some(Duration::from_secs(600)))
            .max_lifetime(Some(Duration::from_secs(3600)))
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy_with(options);

        info!("Database gateway configured for {}", redact_database_url(database_url));
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl DatabaseGateway for PgGateway {
    async fn ensure_tenant(&self, name: &str) -> Result<String, InfraError> {
        let existing = sqlx::query_scalar::<_, String>(
            "SELECT id::text FROM tenants WHERE name = $1 AND deleted_at IS NULL",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = existing {
            debug!("Tenant {} already exists (ID: {})", name, id);
            return Ok(id);
        }

        // A concurrent insert wins the unique key; re-read instead of failing.
        let inserted = sqlx::query_scalar::<_, String>(
            "INSERT INTO tenants (name, plan) VALUES ($1, $2)
             ON CONFLICT (name) DO NOTHING
             RETURNING id::text",
        )
        .bind(name)
        .bind(DEFAULT_TENANT_PLAN)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(id) => {
                info!("Created tenant {} (ID: {})", name, id);
                Ok(id)
            }
            None => sqlx::query_scalar::<_, String>(
                "SELECT id::text FROM tenants WHERE name = $1 AND deleted_at IS NULL",
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| InfraError::NotFound(format!("tenant {name} was deleted concurrently"))),
        }
    }

    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<String>, InfraError> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT id::text FROM tenants WHERE id::text = $1 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_stream(
        &self,
        tenant_id: &str,
        name: &str,
        description: &str,
        retention_days: i32,
    ) -> Result<StreamRecord, InfraError> {
        let topic = generate_topic_name(tenant_id, name);

        sqlx::query_as::<_, StreamRecord>(
            "INSERT INTO streams (tenant_id, name, description, retention_days, topic, status)
             VALUES ($1::uuid, $2, $3, $4, $5, 'active')
             ON CONFLICT (tenant_id, name) DO UPDATE
             SET description = EXCLUDED.description,
                 retention_days = EXCLUDED.retention_days,
                 updated_at = now()
             RETURNING id::text AS id, topic",
        )
        .bind(tenant_id)
        .bind(name)
        .bind(description)
        .bind(retention_days)
        .bind(&topic)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "stream tenant does not exist"))
    }

    async fn get_stream(&self, tenant_id: &str, name: &str) -> Result<StreamRecord, InfraError> {
        sqlx::query_as::<_, StreamRecord>(
            "SELECT id::text AS id, topic FROM streams
             WHERE tenant_id::text = $1 AND name = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| InfraError::NotFound(format!("stream {name} for tenant {tenant_id}")))
    }

    async fn ensure_client(
        &self,
        tenant_id: &str,
        client_id: &str,
        secret: &str,
        stream_id: Option<&str>,
    ) -> Result<ClientRecord, InfraError> {
        let existing = sqlx::query_as::<_, (String, String)>(
            "SELECT id::text, secret_hash FROM clients
             WHERE tenant_id::text = $1 AND client_id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        // Keep the stored hash when the secret still verifies; argon2 salts differ per call.
        let secret_hash = match &existing {
            Some((_, hash)) if verify_password(secret, hash) => hash.clone(),
            _ => hash_password(secret)?,
        };

        sqlx::query_as::<_, ClientRecord>(
            "INSERT INTO clients (tenant_id, client_id, secret_hash, stream_id)
             VALUES ($1::uuid, $2, $3, $4::uuid)
             ON CONFLICT (tenant_id, client_id) DO UPDATE
             SET secret_hash = EXCLUDED.secret_hash,
                 stream_id = EXCLUDED.stream_id,
                 updated_at = now()
             RETURNING id::text AS id, tenant_id::text AS tenant_id, client_id, stream_id::text AS stream_id",
        )
        .bind(tenant_id)
        .bind(client_id)
        .bind(&secret_hash)
        .bind(stream_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "client tenant or stream does not exist"))
    }

    async fn ensure_user(&self, tenant_id: &str, username: &str, password: &str) -> Result<(), InfraError> {
        let existing = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM users
             WHERE tenant_id::text = $1 AND username = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        if existing.as_deref().is_some_and(|hash| verify_password(password, hash)) {
            debug!("User {} already up to date for tenant {}", username, tenant_id);
            return Ok(());
        }

        let password_hash = hash_password(password)?;
        sqlx::query(
            "INSERT INTO users (tenant_id, username, password_hash)
             VALUES ($1::uuid, $2, $3)
             ON CONFLICT (tenant_id, username) DO UPDATE
             SET password_hash = EXCLUDED.password_hash,
                 updated_at = now()",
        )
        .bind(tenant_id)
        .bind(username)
        .bind(&password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "user tenant does not exist"))?;

        info!("Persisted user {} for tenant {}", username, tenant_id);
        Ok(())
    }
}
