//! Main controller implementation.
//!
//! Builds the infrastructure clients from [`Config`], wires one reconciler
//! per kind and runs their watchers next to the metrics and health servers.
//! The controller exits as soon as any of those tasks does.

use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::{health_router, metrics_router, serve, Metrics, Readiness};
use crate::reconciler::{
    AuthConfigReconciler, ClientReconciler, DataPlaneReconciler, InitReconciler, Reconcile, StreamReconciler,
    TenantReconciler, UserReconciler,
};
use crate::store::KubeStore;
use crate::watcher::{watch_resource, WatchContext};
use crds::{StrandAuthConfig, StrandClient, StrandDataPlane, StrandInit, StrandStream, StrandTenant, StrandUser};
use futures::future::select_all;
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use strand_infra::{
    BrokerAdmin, DatabaseGateway, KafkaBrokerAdmin, NetworkProbe, PgGateway, RandomPasswordGenerator,
    SqlxMigrationRunner,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

type Task = (&'static str, JoinHandle<Result<(), ControllerError>>);

/// Main controller for Strand resources.
pub struct Controller {
    tasks: Vec<Task>,
    readiness: Readiness,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing Strand Controller");

        let kube_client = Client::try_default().await?;
        let metrics = Metrics::new()?;
        let readiness = Readiness::default();

        let gateway: Option<Arc<dyn DatabaseGateway>> = match config.database_url.as_deref() {
            Some(url) => match PgGateway::connect_lazy(url) {
                Ok(gateway) => Some(Arc::new(gateway)),
                Err(e) => {
                    warn!("Database gateway unavailable, database-backed kinds will wait: {}", e);
                    None
                }
            },
            None => {
                warn!("DATABASE_URL is empty, database-backed kinds will wait");
                None
            }
        };

        let broker: Option<Arc<dyn BrokerAdmin>> = if config.brokers.is_empty() {
            info!("BROKER_URL is empty, topic creation disabled");
            None
        } else {
            Some(Arc::new(KafkaBrokerAdmin::new(config.brokers.clone(), config.probe_timeout)?))
        };

        let store = Arc::new(KubeStore::new(kube_client.clone(), config.namespace.clone()));
        let generator = Arc::new(RandomPasswordGenerator);
        let ns = config.namespace.as_deref();

        let mut tasks = Vec::new();

        tasks.push(spawn_watcher::<StrandTenant, _>(
            &kube_client,
            ns,
            TenantReconciler::new(store.clone(), gateway.clone()),
            &metrics,
        ));
        tasks.push(spawn_watcher::<StrandStream, _>(
            &kube_client,
            ns,
            StreamReconciler::new(store.clone(), gateway.clone(), broker),
            &metrics,
        ));
        tasks.push(spawn_watcher::<StrandClient, _>(
            &kube_client,
            ns,
            ClientReconciler::new(store.clone(), store.clone(), gateway.clone(), generator.clone()),
            &metrics,
        ));
        tasks.push(spawn_watcher::<StrandUser, _>(
            &kube_client,
            ns,
            UserReconciler::new(store.clone(), store.clone(), gateway, generator),
            &metrics,
        ));
        tasks.push(spawn_watcher::<StrandDataPlane, _>(
            &kube_client,
            ns,
            DataPlaneReconciler::new(store.clone(), Arc::new(NetworkProbe::new(config.probe_timeout))),
            &metrics,
        ));
        tasks.push(spawn_watcher::<StrandInit, _>(
            &kube_client,
            ns,
            InitReconciler::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                Arc::new(SqlxMigrationRunner::default()),
            ),
            &metrics,
        ));
        tasks.push(spawn_watcher::<StrandAuthConfig, _>(
            &kube_client,
            ns,
            AuthConfigReconciler::new(store.clone(), store),
            &metrics,
        ));

        let metrics_addr = config.metrics_addr;
        let metrics_app = metrics_router(metrics);
        tasks.push((
            "metrics server",
            tokio::spawn(async move { serve(metrics_addr, metrics_app, "metrics").await }),
        ));
        let health_addr = config.health_addr;
        let health_app = health_router(readiness.clone());
        tasks.push((
            "health server",
            tokio::spawn(async move { serve(health_addr, health_app, "health").await }),
        ));

        Ok(Self { tasks, readiness })
    }

    /// Runs until the first task exits.
    pub async fn run(self) -> Result<(), ControllerError> {
        self.readiness.set_ready();
        info!("Strand Controller running with {} tasks", self.tasks.len());

        let (names, handles): (Vec<&'static str>, Vec<_>) = self.tasks.into_iter().unzip();
        let (result, index, _remaining) = select_all(handles).await;
        let name = names.get(index).copied().unwrap_or("unknown");

        result
            .map_err(|e| ControllerError::Watch(format!("{name} panicked: {e}")))?
            .map_err(|e| ControllerError::Watch(format!("{name} error: {e}")))?;

        info!("{} exited, shutting down", name);
        Ok(())
    }
}

/// Spawn a watcher for kind `K` driven by `reconciler`.
fn spawn_watcher<K, R>(client: &Client, namespace: Option<&str>, reconciler: R, metrics: &Metrics) -> Task
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    R: Reconcile,
{
    let api: Api<K> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    let kind = reconciler.kind();
    let ctx = Arc::new(WatchContext::new(Arc::new(reconciler), metrics.clone()));
    info!("Starting {} watcher", kind);
    (kind, tokio::spawn(watch_resource(api, ctx)))
}
