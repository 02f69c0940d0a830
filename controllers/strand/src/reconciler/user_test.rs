//! Unit tests for StrandUser reconciler

#[cfg(test)]
mod tests {
    use crate::reconciler::user::{reset_requested, user_secret_name, PASSWORD_KEY, RESET_REQUEUE, USERNAME_KEY};
    use crate::reconciler::{secret_value, ObjectKey, Reconcile, UserReconciler, DEPENDENCY_REQUEUE, INFRASTRUCTURE_REQUEUE};
    use crate::store::{MemoryStore, ObjectStore};
    use crate::test_utils::*;
    use crds::{find_condition, StrandUser, UserPhase, CONDITION_READY};
    use k8s_openapi::api::core::v1::Secret;
    use kube_runtime::controller::Action;
    use std::sync::Arc;
    use strand_infra::{DatabaseGateway, MockGateway, SequencePasswordGenerator};

    const TENANT_ID: &str = "6f1c2b7e-8f3a-4c5d-9e0f-1a2b3c4d5e6f";

    struct Harness {
        reconciler: UserReconciler,
        users: MemoryStore<StrandUser>,
        secrets: MemoryStore<Secret>,
        gateway: MockGateway,
        generator: SequencePasswordGenerator,
    }

    fn setup(with_gateway: bool) -> Harness {
        let users = MemoryStore::new();
        let secrets = MemoryStore::new();
        let gateway = MockGateway::new();
        let generator = SequencePasswordGenerator::new();
        let reconciler = UserReconciler::new(
            Arc::new(users.clone()),
            Arc::new(secrets.clone()),
            with_gateway.then(|| Arc::new(gateway.clone()) as Arc<dyn DatabaseGateway>),
            Arc::new(generator.clone()),
        );
        Harness {
            reconciler,
            users,
            secrets,
            gateway,
            generator,
        }
    }

    fn key() -> ObjectKey {
        ObjectKey::new("default", "alice")
    }

    #[tokio::test]
    async fn test_reconcile_user_generates_password() {
        // Setup: User without a password
        let h = setup(true);
        h.users.insert(create_test_user("alice", "default", "alice", TENANT_ID, None));

        // Execute: Reconcile
        let action = h.reconciler.reconcile(&key()).await.unwrap();

        // Assert: Password generated, surfaced and persisted
        assert_eq!(action, Action::await_change());
        let status = h.users.snapshot("default", "alice").unwrap().status.unwrap();
        assert_eq!(status.phase, UserPhase::Active);
        assert_eq!(status.password.as_deref(), Some("generated-1"));
        assert!(status.password_generated);
        assert_eq!(find_condition(&status.conditions, CONDITION_READY).unwrap().reason, "UserActive");

        let secret = h.secrets.snapshot("default", &user_secret_name("alice")).unwrap();
        assert_eq!(secret_value(&secret, USERNAME_KEY).as_deref(), Some("alice"));
        assert_eq!(secret_value(&secret, PASSWORD_KEY).as_deref(), Some("generated-1"));

        let stored = h.gateway.user(TENANT_ID, "alice").unwrap();
        assert_eq!(stored.password, "generated-1");
    }

    #[tokio::test]
    async fn test_reconcile_user_idempotent() {
        let h = setup(true);
        h.users.insert(create_test_user("alice", "default", "alice", TENANT_ID, None));

        h.reconciler.reconcile(&key()).await.unwrap();
        h.reconciler.reconcile(&key()).await.unwrap();

        assert_eq!(h.users.status_writes(), 1, "Second reconcile should not write status");
        assert_eq!(h.generator.generated(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_user_password_is_write_once() {
        // Setup: Status already carries a surfaced password that differs from the spec
        let h = setup(true);
        let mut user = create_test_user("alice", "default", "alice", TENANT_ID, Some("new-password"));
        user.status = Some(crds::StrandUserStatus {
            phase: UserPhase::Active,
            password: Some("first-password".to_string()),
            ..Default::default()
        });
        h.users.insert(user);

        // Execute: Reconcile
        h.reconciler.reconcile(&key()).await.unwrap();

        // Assert: The spec password is applied but status.password is untouched
        let status = h.users.snapshot("default", "alice").unwrap().status.unwrap();
        assert_eq!(status.password.as_deref(), Some("first-password"));
        assert_eq!(h.gateway.user(TENANT_ID, "alice").unwrap().password, "new-password");
    }

    #[tokio::test]
    async fn test_reconcile_user_reset_flow() {
        // Setup: User created with a spec password, then the spec password is cleared
        let h = setup(true);
        h.users
            .insert(create_test_user("alice", "default", "alice", TENANT_ID, Some("chosen")));
        h.reconciler.reconcile(&key()).await.unwrap();
        let mut user = h.users.snapshot("default", "alice").unwrap();
        assert_eq!(user.status.as_ref().unwrap().password.as_deref(), Some("chosen"));
        user.spec.password = None;
        assert!(reset_requested(&user));
        h.users.insert(user);

        // Execute: Reconcile dispatches to the reset
        let action = h.reconciler.reconcile(&key()).await.unwrap();

        // Assert: Password cleared, Pending, Secret removed, quick requeue
        assert_eq!(action, Action::requeue(RESET_REQUEUE));
        let status = h.users.snapshot("default", "alice").unwrap().status.unwrap();
        assert_eq!(status.phase, UserPhase::Pending);
        assert!(status.password.is_none());
        assert!(!status.password_generated);
        assert!(status.last_password_reset.is_some());
        assert!(h.secrets.snapshot("default", &user_secret_name("alice")).is_none());

        // Execute: Follow-up pass
        h.reconciler.reconcile(&key()).await.unwrap();

        // Assert: Fresh password generated and surfaced
        let status = h.users.snapshot("default", "alice").unwrap().status.unwrap();
        assert_eq!(status.phase, UserPhase::Active);
        assert_eq!(status.password.as_deref(), Some("generated-1"));
        assert!(status.password_generated);
        assert_eq!(h.gateway.user(TENANT_ID, "alice").unwrap().password, "generated-1");
    }

    #[tokio::test]
    async fn test_generated_password_is_not_a_reset_request() {
        let h = setup(true);
        h.users.insert(create_test_user("alice", "default", "alice", TENANT_ID, None));
        h.reconciler.reconcile(&key()).await.unwrap();

        let user = h.users.snapshot("default", "alice").unwrap();
        assert!(!reset_requested(&user));
    }

    #[tokio::test]
    async fn test_reset_password_directly() {
        let h = setup(true);
        h.users.insert(create_test_user("alice", "default", "alice", TENANT_ID, None));
        h.reconciler.reconcile(&key()).await.unwrap();

        let action = h.reconciler.reset_password(&key(), "alice").await.unwrap();
        assert_eq!(action, Action::requeue(RESET_REQUEUE));

        h.reconciler.reconcile(&key()).await.unwrap();
        let status = h.users.snapshot("default", "alice").unwrap().status.unwrap();
        assert_eq!(status.password.as_deref(), Some("generated-2"));
    }

    #[tokio::test]
    async fn test_reconcile_user_database_error() {
        let h = setup(true);
        h.gateway.fail_with("connection refused");
        h.users.insert(create_test_user("alice", "default", "alice", TENANT_ID, None));

        let action = h.reconciler.reconcile(&key()).await.unwrap();

        assert_eq!(action, Action::requeue(DEPENDENCY_REQUEUE));
        let status = h.users.snapshot("default", "alice").unwrap().status.unwrap();
        assert_eq!(status.phase, UserPhase::Error);
        assert!(status.password.is_none(), "Password is only surfaced once persisted");
        assert_eq!(find_condition(&status.conditions, CONDITION_READY).unwrap().reason, "DatabaseError");
    }

    #[tokio::test]
    async fn test_reconcile_user_without_gateway() {
        let h = setup(false);
        h.users.insert(create_test_user("alice", "default", "alice", TENANT_ID, None));

        let action = h.reconciler.reconcile(&key()).await.unwrap();

        assert_eq!(action, Action::requeue(INFRASTRUCTURE_REQUEUE));
        let status = h.users.snapshot("default", "alice").unwrap().status.unwrap();
        assert_eq!(status.phase, UserPhase::Pending);
        assert_eq!(
            find_condition(&status.conditions, CONDITION_READY).unwrap().reason,
            "InfrastructureNotReady"
        );

        // The generated password waits in the Secret for the next pass
        let secret = h.secrets.snapshot("default", &user_secret_name("alice")).unwrap();
        assert_eq!(secret_value(&secret, PASSWORD_KEY).as_deref(), Some("generated-1"));
    }

    #[tokio::test]
    async fn test_reconcile_user_username_collision_is_reported() {
        // Setup: Two users in one namespace with the same username in different tenants
        const OTHER_TENANT: &str = "0a9b8c7d-6e5f-4a3b-2c1d-0e9f8a7b6c5d";
        let h = setup(true);
        h.users.insert(create_test_user("alice", "default", "alice", TENANT_ID, None));
        h.users
            .insert(create_test_user("alice-eu", "default", "alice", OTHER_TENANT, None));
        h.reconciler.reconcile(&key()).await.unwrap();

        // Execute: Reconcile the second user
        let other = ObjectKey::new("default", "alice-eu");
        let action = h.reconciler.reconcile(&other).await.unwrap();

        // Assert: The first user's password is neither adopted nor overwritten
        assert_eq!(action, Action::requeue(DEPENDENCY_REQUEUE));
        let status = h.users.snapshot("default", "alice-eu").unwrap().status.unwrap();
        assert_eq!(status.phase, UserPhase::Error);
        assert!(status.password.is_none());
        let ready = find_condition(&status.conditions, CONDITION_READY).unwrap();
        assert_eq!(ready.reason, "SecretConflict");
        assert!(ready.message.contains("alice"));
        assert!(h.gateway.user(OTHER_TENANT, "alice").is_none());

        let secret = h.secrets.snapshot("default", &user_secret_name("alice")).unwrap();
        assert_eq!(secret.metadata.owner_references.as_ref().unwrap()[0].name, "alice");
        assert_eq!(secret_value(&secret, PASSWORD_KEY).as_deref(), Some("generated-1"));

        // Execute: The first user goes away
        h.users.delete("default", "alice").await.unwrap();
        h.reconciler.reconcile(&other).await.unwrap();

        // Assert: The second user takes the Secret over
        let status = h.users.snapshot("default", "alice-eu").unwrap().status.unwrap();
        assert_eq!(status.phase, UserPhase::Active);
        let secret = h.secrets.snapshot("default", &user_secret_name("alice")).unwrap();
        assert_eq!(secret.metadata.owner_references.unwrap()[0].name, "alice-eu");
    }
}
