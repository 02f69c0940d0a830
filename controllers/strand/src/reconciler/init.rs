//! Init reconciler
//!
//! Handles: StrandInit
//!
//! Applies schema migrations to the control-plane database, then waits for
//! the listed gateway Deployments to have an available replica.

use super::{write_status, ObjectKey, Reconcile, GATEWAY_REQUEUE};
use crate::error::ControllerError;
use crate::store::ObjectStore;
use async_trait::async_trait;
use crds::{
    set_condition, InitPhase, StatusCondition, StrandDataPlane, StrandInit, StrandInitStatus, CONDITION_MIGRATIONS_COMPLETE,
    CONDITION_READY,
};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::Arc;
use strand_infra::{build_database_url, redact_database_url, ConnectionParts, MigrationRunner};
use tracing::{debug, error, info, warn};

/// Secret key holding the database password
pub const PASSWORD_KEY: &str = "password";

/// Runs migrations for StrandInit objects.
pub struct InitReconciler {
    inits: Arc<dyn ObjectStore<StrandInit>>,
    data_planes: Arc<dyn ObjectStore<StrandDataPlane>>,
    secrets: Arc<dyn ObjectStore<Secret>>,
    deployments: Arc<dyn ObjectStore<Deployment>>,
    runner: Arc<dyn MigrationRunner>,
}

impl InitReconciler {
    pub fn new(
        inits: Arc<dyn ObjectStore<StrandInit>>,
        data_planes: Arc<dyn ObjectStore<StrandDataPlane>>,
        secrets: Arc<dyn ObjectStore<Secret>>,
        deployments: Arc<dyn ObjectStore<Deployment>>,
        runner: Arc<dyn MigrationRunner>,
    ) -> Self {
        Self {
            inits,
            data_planes,
            secrets,
            deployments,
            runner,
        }
    }

    /// The explicit URL, or one assembled from the single StrandDataPlane.
    async fn database_url(&self, init: &StrandInit, namespace: &str) -> Result<String, ControllerError> {
        if let Some(url) = init.spec.explicit_database_url() {
            return Ok(url.to_string());
        }

        let mut data_planes = self.data_planes.list(None).await?;
        let data_plane = match data_planes.len() {
            0 => {
                return Err(ControllerError::InvalidConfig(
                    "no data plane configuration found".to_string(),
                ))
            }
            1 => data_planes.remove(0),
            _ => {
                let names: Vec<String> = data_planes
                    .iter()
                    .map(|dp| {
                        format!(
                            "{}/{}",
                            dp.metadata.namespace.as_deref().unwrap_or("default"),
                            dp.metadata.name.as_deref().unwrap_or_default()
                        )
                    })
                    .collect();
                return Err(ControllerError::InvalidConfig(format!(
                    "expected exactly one data plane configuration, found {}: {}",
                    names.len(),
                    names.join(", ")
                )));
            }
        };

        let db = &data_plane.spec.postgres_config;
        let password = match db.password_ref.as_deref().filter(|r| !r.is_empty()) {
            Some(secret_name) => {
                let secret = self.secrets.get(namespace, secret_name).await?.ok_or_else(|| {
                    ControllerError::InvalidConfig(format!("password secret {namespace}/{secret_name} not found"))
                })?;
                super::secret_value(&secret, PASSWORD_KEY).ok_or_else(|| {
                    ControllerError::InvalidConfig(format!("secret {secret_name} does not contain '{PASSWORD_KEY}' key"))
                })?
            }
            None => String::new(),
        };

        Ok(build_database_url(&ConnectionParts {
            scheme: db.type_.scheme(),
            user: &db.user,
            password: &password,
            host: &db.host,
            port: db.effective_port(),
            database: &db.database,
            ssl_mode: db.ssl_mode.as_deref(),
        }))
    }

    /// Names of listed gateways without an available replica.
    async fn pending_gateways(&self, init: &StrandInit, namespace: &str) -> Result<Vec<String>, ControllerError> {
        let mut pending = Vec::new();
        for name in &init.spec.gateways {
            let available = self
                .deployments
                .get(namespace, name)
                .await?
                .and_then(|d| d.status)
                .and_then(|s| s.available_replicas)
                .unwrap_or(0);
            if available < 1 {
                pending.push(name.clone());
            }
        }
        Ok(pending)
    }
}

#[async_trait]
impl Reconcile for InitReconciler {
    fn kind(&self) -> &'static str {
        "StrandInit"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ControllerError> {
        let Some(init) = self.inits.get(&key.namespace, &key.name).await? else {
            debug!("StrandInit {} no longer exists", key);
            return Ok(Action::await_change());
        };

        info!("Reconciling StrandInit {}", key);
        let current: Option<&StrandInitStatus> = init.status.as_ref();
        let mut desired = current.cloned().unwrap_or_default();

        let url = self.database_url(&init, &key.namespace).await?;
        let path = init.spec.effective_migrations_path();
        debug!("StrandInit {} migrating {} from {}", key, redact_database_url(&url), path);

        if let Err(e) = self.runner.run_migrations(&url, path).await {
            error!("Migrations failed for StrandInit {}: {}", key, e);
            desired.phase = InitPhase::Failed;
            set_condition(
                &mut desired.conditions,
                StatusCondition::falsy(CONDITION_MIGRATIONS_COMPLETE, "MigrationError", e.to_string()),
            );
            write_status(self.inits.as_ref(), key, current, &desired).await?;
            return Err(e.into());
        }
        set_condition(
            &mut desired.conditions,
            StatusCondition::truthy(CONDITION_MIGRATIONS_COMPLETE, "MigrationsApplied", "Migrations applied"),
        );

        match self.runner.version(&url, path).await {
            Ok(version) => {
                desired.version = version.version;
                desired.dirty = version.dirty;
            }
            Err(e) => warn!("Failed to read migration version for StrandInit {}: {}", key, e),
        }

        let pending = self.pending_gateways(&init, &key.namespace).await?;
        if !pending.is_empty() {
            info!("StrandInit {} waiting for gateways: {}", key, pending.join(", "));
            desired.phase = InitPhase::Pending;
            set_condition(
                &mut desired.conditions,
                StatusCondition::falsy(
                    CONDITION_READY,
                    "WaitingForGateways",
                    "Migrations complete, waiting for gateways",
                ),
            );
            write_status(self.inits.as_ref(), key, current, &desired).await?;
            return Ok(Action::requeue(GATEWAY_REQUEUE));
        }

        desired.phase = InitPhase::Initialized;
        set_condition(
            &mut desired.conditions,
            StatusCondition::truthy(
                CONDITION_READY,
                "MigrationsComplete",
                format!(
                    "Database migrations completed successfully (version: {}) and gateways are ready",
                    desired.version
                ),
            ),
        );
        if write_status(self.inits.as_ref(), key, current, &desired).await? {
            info!("StrandInit {} initialized at version {}", key, desired.version);
        }

        Ok(Action::await_change())
    }
}
