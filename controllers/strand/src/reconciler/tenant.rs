//! Tenant reconciler
//!
//! Handles: StrandTenant

use super::{infrastructure_not_ready, write_status, ObjectKey, Reconcile, INFRASTRUCTURE_REQUEUE};
use crate::error::ControllerError;
use crate::store::ObjectStore;
use async_trait::async_trait;
use crds::{set_condition, StatusCondition, StrandTenant, TenantPhase, CONDITION_READY};
use kube_runtime::controller::Action;
use std::sync::Arc;
use strand_infra::DatabaseGateway;
use tracing::{debug, info};

/// Mirrors StrandTenant objects into the `tenants` table.
pub struct TenantReconciler {
    tenants: Arc<dyn ObjectStore<StrandTenant>>,
    gateway: Option<Arc<dyn DatabaseGateway>>,
}

impl TenantReconciler {
    pub fn new(tenants: Arc<dyn ObjectStore<StrandTenant>>, gateway: Option<Arc<dyn DatabaseGateway>>) -> Self {
        Self { tenants, gateway }
    }
}

#[async_trait]
impl Reconcile for TenantReconciler {
    fn kind(&self) -> &'static str {
        "StrandTenant"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ControllerError> {
        let Some(tenant) = self.tenants.get(&key.namespace, &key.name).await? else {
            debug!("StrandTenant {} no longer exists", key);
            return Ok(Action::await_change());
        };

        info!("Reconciling StrandTenant {}", key);
        let current = tenant.status.as_ref();
        let mut desired = current.cloned().unwrap_or_default();

        let Some(gateway) = &self.gateway else {
            desired.phase = TenantPhase::Pending;
            set_condition(&mut desired.conditions, infrastructure_not_ready());
            write_status(self.tenants.as_ref(), key, current, &desired).await?;
            return Ok(Action::requeue(INFRASTRUCTURE_REQUEUE));
        };

        let display_name = tenant
            .spec
            .display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&key.name);

        let id = gateway.ensure_tenant(display_name).await?;

        if current.is_some_and(|s| s.id.as_deref() == Some(id.as_str()) && s.phase == TenantPhase::Ready) {
            debug!("StrandTenant {} already ready (ID: {})", key, id);
            return Ok(Action::await_change());
        }

        desired.id = Some(id.clone());
        desired.phase = TenantPhase::Ready;
        set_condition(
            &mut desired.conditions,
            StatusCondition::truthy(CONDITION_READY, "TenantReady", format!("Tenant {display_name} is ready")),
        );
        write_status(self.tenants.as_ref(), key, current, &desired).await?;
        info!("StrandTenant {} ready (ID: {})", key, id);

        Ok(Action::await_change())
    }
}
