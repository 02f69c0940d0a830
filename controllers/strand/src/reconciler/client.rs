//! Client reconciler
//!
//! Handles: StrandClient
//!
//! The client secret is settled and stored in the companion Secret before
//! the database is touched. A later reconcile therefore always reuses the
//! same secret, however many times the `clients` upsert has failed.

use super::{
    infrastructure_not_ready, owner_reference, secret_value, upsert_secret, write_status, ObjectKey, Reconcile,
    DEPENDENCY_REQUEUE, INFRASTRUCTURE_REQUEUE,
};
use crate::error::ControllerError;
use crate::store::ObjectStore;
use async_trait::async_trait;
use crds::{set_condition, ClientPhase, StatusCondition, StrandClient, CONDITION_READY};
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::sync::Arc;
use strand_infra::{DatabaseGateway, PasswordGenerator};
use tracing::{debug, error, info, warn};

/// Secret key holding the client ID
pub const CLIENT_ID_KEY: &str = "clientId";
/// Secret key holding the client secret
pub const CLIENT_SECRET_KEY: &str = "clientSecret";

/// Name of the companion Secret for a StrandClient
pub fn client_secret_name(client_name: &str) -> String {
    format!("strand-client-{client_name}")
}

/// Provisions client credentials for StrandClient objects.
pub struct ClientReconciler {
    clients: Arc<dyn ObjectStore<StrandClient>>,
    secrets: Arc<dyn ObjectStore<Secret>>,
    gateway: Option<Arc<dyn DatabaseGateway>>,
    generator: Arc<dyn PasswordGenerator>,
}

impl ClientReconciler {
    pub fn new(
        clients: Arc<dyn ObjectStore<StrandClient>>,
        secrets: Arc<dyn ObjectStore<Secret>>,
        gateway: Option<Arc<dyn DatabaseGateway>>,
        generator: Arc<dyn PasswordGenerator>,
    ) -> Self {
        Self {
            clients,
            secrets,
            gateway,
            generator,
        }
    }
}

#[async_trait]
impl Reconcile for ClientReconciler {
    fn kind(&self) -> &'static str {
        "StrandClient"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ControllerError> {
        let Some(client) = self.clients.get(&key.namespace, &key.name).await? else {
            debug!("StrandClient {} no longer exists", key);
            return Ok(Action::await_change());
        };

        info!("Reconciling StrandClient {}", key);
        let current = client.status.as_ref();
        let mut desired = current.cloned().unwrap_or_default();

        // Resolve the secret: spec, then the companion Secret, then a fresh one
        let secret_name = client_secret_name(&key.name);
        let existing = self.secrets.get(&key.namespace, &secret_name).await?;
        let secret = if let Some(explicit) = client.spec.explicit_secret() {
            desired.secret_generated = false;
            explicit.to_string()
        } else if let Some(stored) = existing.as_ref().and_then(|s| secret_value(s, CLIENT_SECRET_KEY)) {
            stored
        } else {
            debug!("Generating secret for StrandClient {}", key);
            desired.secret_generated = true;
            self.generator.generate()?
        };

        let mut values = BTreeMap::new();
        values.insert(CLIENT_ID_KEY.to_string(), client.spec.client_id.clone());
        values.insert(CLIENT_SECRET_KEY.to_string(), secret.clone());
        upsert_secret(
            self.secrets.as_ref(),
            &key.namespace,
            &secret_name,
            values,
            owner_reference(&client),
            existing,
        )
        .await?;

        let Some(gateway) = &self.gateway else {
            desired.phase = ClientPhase::Pending;
            set_condition(&mut desired.conditions, infrastructure_not_ready());
            write_status(self.clients.as_ref(), key, current, &desired).await?;
            return Ok(Action::requeue(INFRASTRUCTURE_REQUEUE));
        };

        let record = match gateway
            .ensure_client(
                &client.spec.tenant_id,
                &client.spec.client_id,
                &secret,
                client.spec.stream_scope(),
            )
            .await
        {
            Ok(record) => record,
            Err(e) if e.is_missing_dependency() => {
                warn!("StrandClient {} waiting for tenant or stream: {}", key, e);
                desired.phase = ClientPhase::Pending;
                set_condition(
                    &mut desired.conditions,
                    StatusCondition::falsy(CONDITION_READY, "DependencyNotReady", e.to_string()),
                );
                write_status(self.clients.as_ref(), key, current, &desired).await?;
                return Ok(Action::requeue(DEPENDENCY_REQUEUE));
            }
            Err(e) => {
                desired.phase = ClientPhase::Error;
                set_condition(
                    &mut desired.conditions,
                    StatusCondition::falsy(CONDITION_READY, "DatabaseError", e.to_string()),
                );
                if let Err(status_err) = write_status(self.clients.as_ref(), key, current, &desired).await {
                    error!("Failed to record error status for StrandClient {}: {}", key, status_err);
                }
                return Err(e.into());
            }
        };

        desired.id = Some(record.id.clone());
        desired.phase = ClientPhase::Ready;
        set_condition(
            &mut desired.conditions,
            StatusCondition::truthy(CONDITION_READY, "ClientReady", format!("Client {} is ready", record.client_id)),
        );
        if write_status(self.clients.as_ref(), key, current, &desired).await? {
            info!("StrandClient {} ready (ID: {})", key, record.id);
        }

        Ok(Action::await_change())
    }
}
