//! AuthConfig reconciler
//!
//! Handles: StrandAuthConfig
//!
//! Side effects of switching auth modes are looked up in [`TRANSITIONS`].
//! Pairs that are not listed need no action.

use super::{write_status, ObjectKey, Reconcile};
use crate::error::ControllerError;
use crate::store::ObjectStore;
use async_trait::async_trait;
use crds::{
    set_condition, AuthConfigPhase, AuthType, StatusCondition, StrandAuthConfig, StrandUser, CONDITION_READY,
};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Work to do when the auth type changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    /// Nothing to do
    None,
    /// Delete every StrandUser in the watch scope
    PurgeUsers,
}

/// (previous, next) → action
pub const TRANSITIONS: &[(AuthType, AuthType, TransitionAction)] =
    &[(AuthType::Basic, AuthType::Oidc, TransitionAction::PurgeUsers)];

/// Action for moving from `previous` to `next`.
///
/// The first reconcile has no previous type and triggers nothing.
pub fn transition_action(previous: Option<AuthType>, next: AuthType) -> TransitionAction {
    let Some(previous) = previous else {
        return TransitionAction::None;
    };
    TRANSITIONS
        .iter()
        .find(|(from, to, _)| *from == previous && *to == next)
        .map_or(TransitionAction::None, |(_, _, action)| *action)
}

/// Result of a user purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub deleted: usize,
    pub failed: usize,
}

/// Applies auth mode changes for StrandAuthConfig objects.
pub struct AuthConfigReconciler {
    auth_configs: Arc<dyn ObjectStore<StrandAuthConfig>>,
    users: Arc<dyn ObjectStore<StrandUser>>,
}

impl AuthConfigReconciler {
    pub fn new(auth_configs: Arc<dyn ObjectStore<StrandAuthConfig>>, users: Arc<dyn ObjectStore<StrandUser>>) -> Self {
        Self { auth_configs, users }
    }

    /// Delete all users in scope. Individual failures are logged and counted.
    async fn purge_users(&self) -> Result<PurgeSummary, ControllerError> {
        let users = self.users.list(None).await?;
        let mut summary = PurgeSummary::default();

        for user in users {
            let namespace = user.metadata.namespace.as_deref().unwrap_or("default");
            let Some(name) = user.metadata.name.as_deref() else {
                continue;
            };
            match self.users.delete(namespace, name).await {
                Ok(()) => {
                    debug!("Deleted StrandUser {}/{}", namespace, name);
                    summary.deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to delete StrandUser {}/{}: {}", namespace, name, e);
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }
}

#[async_trait]
impl Reconcile for AuthConfigReconciler {
    fn kind(&self) -> &'static str {
        "StrandAuthConfig"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ControllerError> {
        let Some(auth_config) = self.auth_configs.get(&key.namespace, &key.name).await? else {
            debug!("StrandAuthConfig {} no longer exists", key);
            return Ok(Action::await_change());
        };

        info!("Reconciling StrandAuthConfig {}", key);
        let current = auth_config.status.as_ref();
        let mut desired = current.cloned().unwrap_or_default();
        let next = auth_config.spec.type_;
        let previous = current.and_then(|s| s.previous_type);

        match transition_action(previous, next) {
            TransitionAction::PurgeUsers => {
                info!(
                    "StrandAuthConfig {} switching from {} to {}, purging users",
                    key,
                    previous.unwrap_or_default(),
                    next
                );
                let summary = self.purge_users().await?;
                info!(
                    "Purged {} users ({} failed) for StrandAuthConfig {}",
                    summary.deleted, summary.failed, key
                );
            }
            TransitionAction::None => {}
        }

        desired.previous_type = Some(next);
        desired.phase = AuthConfigPhase::Active;
        let ready = if next == AuthType::Oidc && auth_config.spec.oidc_config.is_none() {
            StatusCondition::falsy(
                CONDITION_READY,
                "MissingOidcConfig",
                "Auth type is oidc but oidcConfig is not set",
            )
        } else {
            StatusCondition::truthy(CONDITION_READY, "Configured", format!("Authentication type {next} configured"))
        };
        set_condition(&mut desired.conditions, ready);
        write_status(self.auth_configs.as_ref(), key, current, &desired).await?;

        Ok(Action::await_change())
    }
}
