//! Kubernetes resource watchers.
//!
//! Every kind is driven by a `kube_runtime::Controller` through the generic
//! [`watch_resource`] helper, which handles reconnection, per-object
//! serialization and requeues. Failed reconciles are retried with a
//! per-object Fibonacci backoff that resets on the next success. Entries for
//! objects that stop being retried (deleted while failing) are pruned once
//! they have been idle for longer than any retry delay.

use crate::backoff::{FibonacciBackoff, MAX_BACKOFF_SECS};
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::{ObjectKey, Reconcile};
use futures::StreamExt;
use kube::{Api, Resource};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{watcher, Controller};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Backoff entries untouched for this long belong to objects that are no longer retried
const BACKOFF_IDLE_LIMIT: Duration = Duration::from_secs(2 * MAX_BACKOFF_SECS);

struct BackoffEntry {
    backoff: FibonacciBackoff,
    last_used: Instant,
}

/// Shared state handed to every reconcile of one kind
pub struct WatchContext<R> {
    reconciler: Arc<R>,
    backoffs: Mutex<HashMap<ObjectKey, BackoffEntry>>,
    idle_limit: Duration,
    metrics: Metrics,
}

impl<R: Reconcile> WatchContext<R> {
    pub fn new(reconciler: Arc<R>, metrics: Metrics) -> Self {
        Self {
            reconciler,
            backoffs: Mutex::new(HashMap::new()),
            idle_limit: BACKOFF_IDLE_LIMIT,
            metrics,
        }
    }

    /// Run one reconcile, recording metrics and clearing the backoff on success.
    pub async fn reconcile_key(&self, key: &ObjectKey) -> Result<Action, ControllerError> {
        let kind = self.reconciler.kind();
        debug!("Reconciling {} {}", kind, key);

        let started = Instant::now();
        let result = self.reconciler.reconcile(key).await;
        self.metrics.observe(kind, started.elapsed(), result.is_err());

        if result.is_ok() {
            if let Ok(mut backoffs) = self.backoffs.lock() {
                backoffs.remove(key);
            }
        }
        result
    }

    /// Next retry delay for `key`, advancing its backoff.
    ///
    /// Also drops entries of other objects that have been idle past the limit.
    pub fn next_backoff(&self, key: &ObjectKey) -> Duration {
        let Ok(mut backoffs) = self.backoffs.lock() else {
            return FibonacciBackoff::default().next_backoff();
        };

        let now = Instant::now();
        let idle_limit = self.idle_limit;
        backoffs.retain(|k, entry| k == key || now.duration_since(entry.last_used) <= idle_limit);

        let entry = backoffs.entry(key.clone()).or_insert_with(|| BackoffEntry {
            backoff: FibonacciBackoff::default(),
            last_used: now,
        });
        entry.last_used = now;
        entry.backoff.next_backoff()
    }

    #[cfg(test)]
    fn tracked_backoffs(&self) -> usize {
        self.backoffs.lock().map(|b| b.len()).unwrap_or(0)
    }
}

/// Watch `api` and reconcile every object with `ctx`'s reconciler.
///
/// Runs until the watch stream ends or the process receives a shutdown signal.
pub async fn watch_resource<K, R>(api: Api<K>, ctx: Arc<WatchContext<R>>) -> Result<(), ControllerError>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
    R: Reconcile,
{
    let kind = ctx.reconciler.kind();
    debug!("Starting {} watcher", kind);

    let reconcile = |obj: Arc<K>, ctx: Arc<WatchContext<R>>| async move {
        let key = ObjectKey::from_resource(obj.as_ref())?;
        ctx.reconcile_key(&key).await
    };

    let error_policy = |obj: Arc<K>, err: &ControllerError, ctx: Arc<WatchContext<R>>| {
        let kind = ctx.reconciler.kind();
        match ObjectKey::from_resource(obj.as_ref()) {
            Ok(key) => {
                let delay = ctx.next_backoff(&key);
                error!(
                    "Reconciliation of {} {} failed ({}), retrying in {:?}: {}",
                    kind,
                    key,
                    err.category(),
                    delay,
                    err
                );
                Action::requeue(delay)
            }
            Err(key_err) => {
                error!("Reconciliation of {} failed for an object without a key: {}", kind, key_err);
                Action::await_change()
            }
        }
    };

    // Debounce batches bursts of events for one object; concurrency caps parallel reconciles per kind
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((object, _)) => debug!("Reconciled {} {}", kind, object),
                Err(e) => warn!("Controller error for {}: {}", kind, e),
            }
        })
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flaky {
        fail: AtomicBool,
    }

    #[async_trait]
    impl Reconcile for Flaky {
        fn kind(&self) -> &'static str {
            "Flaky"
        }

        async fn reconcile(&self, _key: &ObjectKey) -> Result<Action, ControllerError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(ControllerError::InvalidConfig("broken".to_string()))
            } else {
                Ok(Action::await_change())
            }
        }
    }

    #[tokio::test]
    async fn test_backoff_grows_and_resets_after_success() {
        let reconciler = Arc::new(Flaky {
            fail: AtomicBool::new(true),
        });
        let ctx = WatchContext::new(Arc::clone(&reconciler), Metrics::new().unwrap());
        let key = ObjectKey::new("default", "obj");

        assert!(ctx.reconcile_key(&key).await.is_err());
        assert_eq!(ctx.next_backoff(&key), Duration::from_secs(15));
        assert_eq!(ctx.next_backoff(&key), Duration::from_secs(15));
        assert_eq!(ctx.next_backoff(&key), Duration::from_secs(30));

        reconciler.fail.store(false, Ordering::SeqCst);
        assert_eq!(ctx.reconcile_key(&key).await.unwrap(), Action::await_change());
        assert_eq!(ctx.next_backoff(&key), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_backoff_is_per_object() {
        let reconciler = Arc::new(Flaky {
            fail: AtomicBool::new(true),
        });
        let ctx = WatchContext::new(reconciler, Metrics::new().unwrap());
        let a = ObjectKey::new("default", "a");
        let b = ObjectKey::new("default", "b");

        ctx.next_backoff(&a);
        ctx.next_backoff(&a);
        assert_eq!(ctx.next_backoff(&a), Duration::from_secs(30));
        assert_eq!(ctx.next_backoff(&b), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_success_for_missing_object_clears_backoff() {
        // Setup: an object that failed and has since been deleted reconciles to await_change
        let reconciler = Arc::new(Flaky {
            fail: AtomicBool::new(false),
        });
        let ctx = WatchContext::new(reconciler, Metrics::new().unwrap());
        let key = ObjectKey::new("default", "gone");
        ctx.next_backoff(&key);
        assert_eq!(ctx.tracked_backoffs(), 1);

        // Execute
        let action = ctx.reconcile_key(&key).await.unwrap();

        // Assert
        assert_eq!(action, Action::await_change());
        assert_eq!(ctx.tracked_backoffs(), 0);
    }

    #[tokio::test]
    async fn test_idle_backoff_entries_are_pruned() {
        // Setup: an object deleted while failing is never reconciled again
        let reconciler = Arc::new(Flaky {
            fail: AtomicBool::new(true),
        });
        let mut ctx = WatchContext::new(reconciler, Metrics::new().unwrap());
        ctx.idle_limit = Duration::ZERO;
        let deleted = ObjectKey::new("default", "deleted");
        let live = ObjectKey::new("default", "live");
        ctx.next_backoff(&deleted);
        std::thread::sleep(Duration::from_millis(5));

        // Execute: another object's failure sweeps idle entries
        ctx.next_backoff(&live);

        // Assert
        assert_eq!(ctx.tracked_backoffs(), 1);
        assert_eq!(ctx.next_backoff(&deleted), Duration::from_secs(15));
    }
}
