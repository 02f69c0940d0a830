//! User reconciler
//!
//! Handles: StrandUser
//!
//! The password is surfaced once in `status.password` and never overwritten
//! there. Clearing `spec.password` on a user whose password came from the
//! spec requests a reset, which wipes the surfaced password and the
//! companion Secret so the next pass generates a fresh one.
//!
//! The companion Secret is keyed on the username, so two users sharing a
//! username in one namespace would share it. The second one is held in
//! `Error` with reason `SecretConflict` until the first is gone.

use super::{
    controller_owner, infrastructure_not_ready, owner_reference, secret_value, upsert_secret, write_status,
    ObjectKey, Reconcile, DEPENDENCY_REQUEUE, INFRASTRUCTURE_REQUEUE,
};
use crate::error::ControllerError;
use crate::store::ObjectStore;
use async_trait::async_trait;
use chrono::Utc;
use crds::{set_condition, StatusCondition, StrandUser, StrandUserStatus, UserPhase, CONDITION_READY};
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use kube_runtime::controller::Action;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use strand_infra::{DatabaseGateway, PasswordGenerator};
use tracing::{debug, info, warn};

/// Secret key holding the username
pub const USERNAME_KEY: &str = "username";
/// Secret key holding the password
pub const PASSWORD_KEY: &str = "password";

/// Delay before the pass that follows a reset
pub const RESET_REQUEUE: Duration = Duration::from_secs(1);

/// Name of the companion Secret for a username
pub fn user_secret_name(username: &str) -> String {
    format!("strand-user-{username}")
}

/// Whether the status shows a spec-provided password that the spec no longer carries.
pub fn reset_requested(user: &StrandUser) -> bool {
    let Some(status) = &user.status else {
        return false;
    };
    user.spec.explicit_password().is_none() && status.surfaced_password().is_some() && !status.password_generated
}

/// Provisions StrandUser objects.
pub struct UserReconciler {
    users: Arc<dyn ObjectStore<StrandUser>>,
    secrets: Arc<dyn ObjectStore<Secret>>,
    gateway: Option<Arc<dyn DatabaseGateway>>,
    generator: Arc<dyn PasswordGenerator>,
}

impl UserReconciler {
    pub fn new(
        users: Arc<dyn ObjectStore<StrandUser>>,
        secrets: Arc<dyn ObjectStore<Secret>>,
        gateway: Option<Arc<dyn DatabaseGateway>>,
        generator: Arc<dyn PasswordGenerator>,
    ) -> Self {
        Self {
            users,
            secrets,
            gateway,
            generator,
        }
    }

    /// Name of another live StrandUser that controls `secret`, if any.
    ///
    /// An owner that no longer exists, or a previous incarnation of this
    /// user, does not count.
    async fn conflicting_owner(
        &self,
        key: &ObjectKey,
        secret: Option<&Secret>,
    ) -> Result<Option<String>, ControllerError> {
        let Some(owner) = secret.and_then(controller_owner) else {
            return Ok(None);
        };
        if owner.kind != StrandUser::kind(&()) || owner.name == key.name {
            return Ok(None);
        }
        match self.users.get(&key.namespace, &owner.name).await? {
            Some(other) if other.metadata.uid.as_deref() == Some(owner.uid.as_str()) => Ok(Some(owner.name.clone())),
            _ => Ok(None),
        }
    }

    /// Clear the surfaced password so the next reconcile generates a new one.
    ///
    /// Drops `status.password`, resets `passwordGenerated`, stamps
    /// `lastPasswordReset`, moves the user back to Pending and deletes the
    /// companion Secret.
    pub async fn reset_password(&self, key: &ObjectKey, username: &str) -> Result<Action, ControllerError> {
        info!("Resetting password for StrandUser {}", key);

        let secret_name = user_secret_name(username);
        let existing = self.secrets.get(&key.namespace, &secret_name).await?;
        match self.conflicting_owner(key, existing.as_ref()).await? {
            Some(other) => warn!(
                "Not deleting Secret {}/{} owned by StrandUser {}",
                key.namespace, secret_name, other
            ),
            None => self.secrets.delete(&key.namespace, &secret_name).await?,
        }

        let patch = json!({
            "password": null,
            "passwordGenerated": false,
            "lastPasswordReset": Utc::now(),
            "phase": UserPhase::Pending,
        });
        self.users.patch_status(&key.namespace, &key.name, patch).await?;

        Ok(Action::requeue(RESET_REQUEUE))
    }

    async fn mark_error(
        &self,
        key: &ObjectKey,
        current: Option<&StrandUserStatus>,
        mut desired: StrandUserStatus,
        reason: &str,
        message: String,
    ) -> Result<Action, ControllerError> {
        desired.phase = UserPhase::Error;
        set_condition(&mut desired.conditions, StatusCondition::falsy(CONDITION_READY, reason, message));
        write_status(self.users.as_ref(), key, current, &desired).await?;
        Ok(Action::requeue(DEPENDENCY_REQUEUE))
    }
}

#[async_trait]
impl Reconcile for UserReconciler {
    fn kind(&self) -> &'static str {
        "StrandUser"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ControllerError> {
        let Some(user) = self.users.get(&key.namespace, &key.name).await? else {
            debug!("StrandUser {} no longer exists", key);
            return Ok(Action::await_change());
        };

        info!("Reconciling StrandUser {}", key);

        if reset_requested(&user) {
            return self.reset_password(key, &user.spec.username).await;
        }

        let current = user.status.as_ref();
        let mut desired = current.cloned().unwrap_or_default();

        let secret_name = user_secret_name(&user.spec.username);
        let existing = self.secrets.get(&key.namespace, &secret_name).await?;
        if let Some(other) = self.conflicting_owner(key, existing.as_ref()).await? {
            warn!(
                "StrandUser {} shares username {} with StrandUser {}",
                key, user.spec.username, other
            );
            let message = format!("Secret {secret_name} belongs to StrandUser {other} with the same username");
            return self.mark_error(key, current, desired, "SecretConflict", message).await;
        }
        let password = if let Some(explicit) = user.spec.explicit_password() {
            explicit.to_string()
        } else if let Some(surfaced) = current.and_then(StrandUserStatus::surfaced_password) {
            surfaced.to_string()
        } else if let Some(stored) = existing.as_ref().and_then(|s| secret_value(s, PASSWORD_KEY)) {
            stored
        } else {
            debug!("Generating password for StrandUser {}", key);
            desired.password_generated = true;
            self.generator.generate()?
        };

        let mut values = BTreeMap::new();
        values.insert(USERNAME_KEY.to_string(), user.spec.username.clone());
        values.insert(PASSWORD_KEY.to_string(), password.clone());
        upsert_secret(
            self.secrets.as_ref(),
            &key.namespace,
            &secret_name,
            values,
            owner_reference(&user),
            existing,
        )
        .await?;

        let Some(gateway) = &self.gateway else {
            desired.phase = UserPhase::Pending;
            set_condition(&mut desired.conditions, infrastructure_not_ready());
            write_status(self.users.as_ref(), key, current, &desired).await?;
            return Ok(Action::requeue(INFRASTRUCTURE_REQUEUE));
        };

        if let Err(e) = gateway
            .ensure_user(&user.spec.tenant_id, &user.spec.username, &password)
            .await
        {
            warn!("Failed to persist StrandUser {}: {}", key, e);
            return self.mark_error(key, current, desired, "DatabaseError", e.to_string()).await;
        }

        if desired.surfaced_password().is_none() {
            desired.password = Some(password);
        }
        desired.phase = UserPhase::Active;
        set_condition(
            &mut desired.conditions,
            StatusCondition::truthy(
                CONDITION_READY,
                "UserActive",
                format!("User {} is active", user.spec.username),
            ),
        );
        if write_status(self.users.as_ref(), key, current, &desired).await? {
            info!("StrandUser {} active", key);
        }

        Ok(Action::await_change())
    }
}
