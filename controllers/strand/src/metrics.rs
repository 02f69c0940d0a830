//! Prometheus metrics and health endpoints.
//!
//! Metrics are served on `/metrics`; liveness and readiness on `/healthz`
//! and `/readyz` of a separate listener.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Reconcile counters and timings, labelled by kind
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    errors: IntCounterVec,
    duration: HistogramVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconciliations = IntCounterVec::new(
            Opts::new("strand_reconciliations_total", "Reconciliations attempted"),
            &["kind"],
        )
        .map_err(metric_error)?;
        let errors = IntCounterVec::new(
            Opts::new("strand_reconciliation_errors_total", "Reconciliations that returned an error"),
            &["kind"],
        )
        .map_err(metric_error)?;
        let duration = HistogramVec::new(
            HistogramOpts::new("strand_reconcile_duration_seconds", "Time spent in a single reconcile"),
            &["kind"],
        )
        .map_err(metric_error)?;

        registry.register(Box::new(reconciliations.clone())).map_err(metric_error)?;
        registry.register(Box::new(errors.clone())).map_err(metric_error)?;
        registry.register(Box::new(duration.clone())).map_err(metric_error)?;

        Ok(Self {
            registry,
            reconciliations,
            errors,
            duration,
        })
    }

    /// Record one reconcile of `kind`.
    pub fn observe(&self, kind: &str, elapsed: Duration, failed: bool) {
        self.reconciliations.with_label_values(&[kind]).inc();
        self.duration.with_label_values(&[kind]).observe(elapsed.as_secs_f64());
        if failed {
            self.errors.with_label_values(&[kind]).inc();
        }
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metric_error)?;
        String::from_utf8(buffer).map_err(|e| ControllerError::Server(e.to_string()))
    }
}

fn metric_error(err: prometheus::Error) -> ControllerError {
    ControllerError::Server(format!("metrics: {err}"))
}

/// Readiness flag flipped once all watchers are running
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn set_ready(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

async fn metrics_handler(State(metrics): State<Metrics>) -> (StatusCode, String) {
    match metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(readiness): State<Readiness>) -> (StatusCode, &'static str) {
    if readiness.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

pub fn metrics_router(metrics: Metrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

pub fn health_router(readiness: Readiness) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(readiness)
}

/// Serve `router` on `addr` until the process exits.
pub async fn serve(addr: SocketAddr, router: Router, what: &str) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Server(format!("failed to bind {what} server on {addr}: {e}")))?;
    info!("Serving {} on {}", what, addr);
    axum::serve(listener, router)
        .await
        .map_err(|e| ControllerError::Server(format!("{what} server failed: {e}")))
}
