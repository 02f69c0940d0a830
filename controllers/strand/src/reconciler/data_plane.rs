//! DataPlane reconciler
//!
//! Handles: StrandDataPlane
//!
//! Probes are advisory. A data plane is always accepted (phase Active) and
//! unreachable components only show up as warnings and a `Ready=False`
//! condition.

use super::{write_status, ObjectKey, Reconcile};
use crate::error::ControllerError;
use crate::store::ObjectStore;
use async_trait::async_trait;
use crds::{set_condition, DataPlanePhase, StatusCondition, StrandDataPlane, CONDITION_READY};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use strand_infra::ConnectivityProbe;
use tracing::{debug, info, warn};

/// How often connectivity is re-checked
pub const RECHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Reports connectivity of the configured database and brokers.
pub struct DataPlaneReconciler {
    data_planes: Arc<dyn ObjectStore<StrandDataPlane>>,
    probe: Arc<dyn ConnectivityProbe>,
}

impl DataPlaneReconciler {
    pub fn new(data_planes: Arc<dyn ObjectStore<StrandDataPlane>>, probe: Arc<dyn ConnectivityProbe>) -> Self {
        Self { data_planes, probe }
    }
}

#[async_trait]
impl Reconcile for DataPlaneReconciler {
    fn kind(&self) -> &'static str {
        "StrandDataPlane"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ControllerError> {
        let Some(data_plane) = self.data_planes.get(&key.namespace, &key.name).await? else {
            debug!("StrandDataPlane {} no longer exists", key);
            return Ok(Action::await_change());
        };

        info!("Reconciling StrandDataPlane {}", key);
        let current = data_plane.status.as_ref();
        let mut desired = current.cloned().unwrap_or_default();
        let mut warnings = Vec::new();

        let db = &data_plane.spec.postgres_config;
        desired.postgres_connected = match self.probe.probe_database(&db.host, db.effective_port()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("StrandDataPlane {} database probe failed: {}", key, e);
                warnings.push(format!("Database connectivity test failed: {e}"));
                false
            }
        };

        let broker = &data_plane.spec.broker_config;
        desired.broker_connected = match self.probe.probe_brokers(&broker.brokers, broker.tls_enabled).await {
            Ok(()) => true,
            Err(e) => {
                warn!("StrandDataPlane {} broker probe failed: {}", key, e);
                warnings.push(format!("Broker connectivity test failed: {e}"));
                false
            }
        };

        desired.warnings = warnings;
        desired.phase = DataPlanePhase::Active;
        let ready = if desired.postgres_connected && desired.broker_connected {
            StatusCondition::truthy(
                CONDITION_READY,
                "ComponentsHealthy",
                "All data plane components are connected and healthy",
            )
        } else {
            StatusCondition::falsy(
                CONDITION_READY,
                "ComponentsUnhealthy",
                "One or more components are not reachable",
            )
        };
        set_condition(&mut desired.conditions, ready);

        write_status(self.data_planes.as_ref(), key, current, &desired).await?;
        Ok(Action::requeue(RECHECK_INTERVAL))
    }
}
