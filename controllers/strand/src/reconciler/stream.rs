//! Stream reconciler
//!
//! Handles: StrandStream
//!
//! ```text
//! Pending → (tenant fails → Error/TenantError) → (row fails → Error/DatabaseError)
//!         → (topic fails → Error/BrokerError) → Ready
//! ```
//!
//! Every failure above is written to status and retried after 30s.

use super::{infrastructure_not_ready, write_status, ObjectKey, Reconcile, DEPENDENCY_REQUEUE, INFRASTRUCTURE_REQUEUE};
use crate::error::ControllerError;
use crate::store::ObjectStore;
use async_trait::async_trait;
use crds::{
    set_condition, StatusCondition, StrandStream, StrandStreamStatus, StreamPhase, CONDITION_STREAM_CREATED,
};
use kube_runtime::controller::Action;
use std::sync::Arc;
use strand_infra::{BrokerAdmin, DatabaseGateway, InfraError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Creates the `streams` row and the broker topic for StrandStream objects.
pub struct StreamReconciler {
    streams: Arc<dyn ObjectStore<StrandStream>>,
    gateway: Option<Arc<dyn DatabaseGateway>>,
    broker: Option<Arc<dyn BrokerAdmin>>,
}

/// Why a stream could not be made ready
enum StreamFailure {
    Tenant(String),
    Database(InfraError),
    Broker(InfraError),
}

impl StreamFailure {
    fn reason(&self) -> &'static str {
        match self {
            Self::Tenant(_) => "TenantError",
            Self::Database(_) => "DatabaseError",
            Self::Broker(_) => "BrokerError",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Tenant(msg) => msg.clone(),
            Self::Database(e) | Self::Broker(e) => e.to_string(),
        }
    }
}

impl StreamReconciler {
    pub fn new(
        streams: Arc<dyn ObjectStore<StrandStream>>,
        gateway: Option<Arc<dyn DatabaseGateway>>,
        broker: Option<Arc<dyn BrokerAdmin>>,
    ) -> Self {
        Self {
            streams,
            gateway,
            broker,
        }
    }

    /// A UUID is looked up as-is and must exist; anything else is a tenant name.
    async fn resolve_tenant(&self, gateway: &dyn DatabaseGateway, tenant_ref: &str) -> Result<String, StreamFailure> {
        if Uuid::parse_str(tenant_ref).is_ok() {
            return match gateway.find_tenant(tenant_ref).await {
                Ok(Some(id)) => Ok(id),
                Ok(None) => Err(StreamFailure::Tenant(format!("tenant {tenant_ref} not found"))),
                Err(e) => Err(StreamFailure::Tenant(format!("tenant {tenant_ref} lookup failed: {e}"))),
            };
        }
        gateway
            .ensure_tenant(tenant_ref)
            .await
            .map_err(|e| StreamFailure::Tenant(format!("tenant {tenant_ref} could not be ensured: {e}")))
    }

    async fn provision(&self, gateway: &dyn DatabaseGateway, stream: &StrandStream) -> Result<(String, String), StreamFailure> {
        let tenant_id = self.resolve_tenant(gateway, &stream.spec.tenant_id).await?;

        let record = gateway
            .create_stream(
                &tenant_id,
                &stream.spec.name,
                &stream.spec.description,
                stream.spec.effective_retention_days(),
            )
            .await
            .map_err(StreamFailure::Database)?;

        match &self.broker {
            Some(broker) => broker.create_topic(&record.topic).await.map_err(StreamFailure::Broker)?,
            None => debug!("No broker configured, skipping topic {}", record.topic),
        }

        Ok((record.id, record.topic))
    }
}

#[async_trait]
impl Reconcile for StreamReconciler {
    fn kind(&self) -> &'static str {
        "StrandStream"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ControllerError> {
        let Some(stream) = self.streams.get(&key.namespace, &key.name).await? else {
            debug!("StrandStream {} no longer exists", key);
            return Ok(Action::await_change());
        };

        info!("Reconciling StrandStream {}", key);
        let current: Option<&StrandStreamStatus> = stream.status.as_ref();
        let mut desired = current.cloned().unwrap_or_default();

        let Some(gateway) = &self.gateway else {
            desired.phase = StreamPhase::Pending;
            set_condition(&mut desired.conditions, infrastructure_not_ready());
            write_status(self.streams.as_ref(), key, current, &desired).await?;
            return Ok(Action::requeue(INFRASTRUCTURE_REQUEUE));
        };

        match self.provision(gateway.as_ref(), &stream).await {
            Ok((stream_id, topic)) => {
                desired.phase = StreamPhase::Ready;
                desired.stream_id = Some(stream_id);
                set_condition(
                    &mut desired.conditions,
                    StatusCondition::truthy(
                        CONDITION_STREAM_CREATED,
                        "Success",
                        format!("Stream created with topic: {topic}"),
                    ),
                );
                desired.topic = Some(topic);
                if write_status(self.streams.as_ref(), key, current, &desired).await? {
                    info!("StrandStream {} ready", key);
                }
                Ok(Action::await_change())
            }
            Err(failure) => {
                let message = failure.message();
                warn!("StrandStream {} failed ({}): {}", key, failure.reason(), message);
                desired.phase = StreamPhase::Error;
                set_condition(
                    &mut desired.conditions,
                    StatusCondition::falsy(CONDITION_STREAM_CREATED, failure.reason(), message),
                );
                write_status(self.streams.as_ref(), key, current, &desired).await?;
                Ok(Action::requeue(DEPENDENCY_REQUEUE))
            }
        }
    }
}
