//! Unit tests for StrandStream reconciler

#[cfg(test)]
mod tests {
    use crate::reconciler::{ObjectKey, Reconcile, StreamReconciler, DEPENDENCY_REQUEUE, INFRASTRUCTURE_REQUEUE};
    use crate::store::MemoryStore;
    use crate::test_utils::*;
    use crds::{find_condition, StrandStream, StreamPhase, CONDITION_READY, CONDITION_STREAM_CREATED, DEFAULT_RETENTION_DAYS};
    use kube_runtime::controller::Action;
    use std::sync::Arc;
    use strand_infra::{generate_topic_name, MockBrokerAdmin, MockGateway};

    const TENANT_ID: &str = "6f1c2b7e-8f3a-4c5d-9e0f-1a2b3c4d5e6f";

    struct Harness {
        reconciler: StreamReconciler,
        streams: MemoryStore<StrandStream>,
        gateway: MockGateway,
        broker: MockBrokerAdmin,
    }

    fn setup() -> Harness {
        let streams = MemoryStore::new();
        let gateway = MockGateway::new();
        gateway.add_tenant("acme", TENANT_ID);
        let broker = MockBrokerAdmin::new();
        let reconciler = StreamReconciler::new(
            Arc::new(streams.clone()),
            Some(Arc::new(gateway.clone())),
            Some(Arc::new(broker.clone())),
        );
        Harness {
            reconciler,
            streams,
            gateway,
            broker,
        }
    }

    #[tokio::test]
    async fn test_reconcile_stream_create() {
        // Setup: Stream for an existing tenant ID
        let h = setup();
        h.streams.insert(create_test_stream("orders", "default", TENANT_ID, "Order Events"));

        // Execute: Reconcile
        let action = h.reconciler.reconcile(&ObjectKey::new("default", "orders")).await.unwrap();

        // Assert: Topic created and status Ready
        let topic = generate_topic_name(TENANT_ID, "Order Events");
        assert_eq!(topic, "stream-6f1c2b7e-order-events");
        assert_eq!(action, Action::await_change());
        assert_eq!(h.broker.topics(), vec![topic.clone()]);

        let status = h.streams.snapshot("default", "orders").unwrap().status.unwrap();
        assert_eq!(status.phase, StreamPhase::Ready);
        assert_eq!(status.topic.as_deref(), Some(topic.as_str()));
        assert!(status.stream_id.is_some());
        let created = find_condition(&status.conditions, CONDITION_STREAM_CREATED).unwrap();
        assert!(created.is_true());
        assert_eq!(created.reason, "Success");
        assert_eq!(created.message, format!("Stream created with topic: {topic}"));
    }

    #[tokio::test]
    async fn test_reconcile_stream_applies_default_retention() {
        let h = setup();
        h.streams.insert(create_test_stream("orders", "default", TENANT_ID, "orders"));

        h.reconciler.reconcile(&ObjectKey::new("default", "orders")).await.unwrap();

        let (_, retention) = h.gateway.stream_settings(TENANT_ID, "orders").unwrap();
        assert_eq!(retention, DEFAULT_RETENTION_DAYS);
    }

    #[tokio::test]
    async fn test_reconcile_stream_idempotent() {
        let h = setup();
        h.streams.insert(create_test_stream("orders", "default", TENANT_ID, "orders"));
        let key = ObjectKey::new("default", "orders");

        h.reconciler.reconcile(&key).await.unwrap();
        let first = h.streams.snapshot("default", "orders").unwrap().status;
        h.reconciler.reconcile(&key).await.unwrap();

        assert_eq!(h.streams.status_writes(), 1, "Second reconcile should not write status");
        assert_eq!(h.streams.snapshot("default", "orders").unwrap().status, first);
        assert_eq!(h.gateway.stream_count(), 1);
        assert_eq!(h.broker.topics().len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_stream_unknown_tenant_id() {
        // Setup: Stream referencing a UUID that has no tenant row
        let h = setup();
        let unknown = "00000000-0000-4000-8000-000000000000";
        h.streams.insert(create_test_stream("orders", "default", unknown, "orders"));

        // Execute: Reconcile
        let action = h.reconciler.reconcile(&ObjectKey::new("default", "orders")).await.unwrap();

        // Assert: Error/TenantError, requeue 30s, no stream row and no topic
        assert_eq!(action, Action::requeue(DEPENDENCY_REQUEUE));
        assert!(h.broker.topics().is_empty());
        assert_eq!(h.gateway.stream_count(), 0);

        let status = h.streams.snapshot("default", "orders").unwrap().status.unwrap();
        assert_eq!(status.phase, StreamPhase::Error);
        let created = find_condition(&status.conditions, CONDITION_STREAM_CREATED).unwrap();
        assert!(!created.is_true());
        assert_eq!(created.reason, "TenantError");
        assert_eq!(created.message, format!("tenant {unknown} not found"));
    }

    #[tokio::test]
    async fn test_reconcile_stream_tenant_name_is_ensured() {
        let h = setup();
        h.streams.insert(create_test_stream("orders", "default", "initech", "orders"));

        h.reconciler.reconcile(&ObjectKey::new("default", "orders")).await.unwrap();

        let tenant_id = h.gateway.tenant_id("initech").expect("tenant should be created by name");
        assert_eq!(h.broker.topics(), vec![generate_topic_name(&tenant_id, "orders")]);
    }

    #[tokio::test]
    async fn test_reconcile_stream_broker_failure() {
        let h = setup();
        h.broker.fail_with("leader not available");
        h.streams.insert(create_test_stream("orders", "default", TENANT_ID, "orders"));

        let action = h.reconciler.reconcile(&ObjectKey::new("default", "orders")).await.unwrap();

        assert_eq!(action, Action::requeue(DEPENDENCY_REQUEUE));
        let status = h.streams.snapshot("default", "orders").unwrap().status.unwrap();
        assert_eq!(status.phase, StreamPhase::Error);
        let created = find_condition(&status.conditions, CONDITION_STREAM_CREATED).unwrap();
        assert_eq!(created.reason, "BrokerError");
    }

    #[tokio::test]
    async fn test_reconcile_stream_database_failure() {
        let h = setup();
        h.streams.insert(create_test_stream("orders", "default", "initech", "orders"));
        h.gateway.fail_with("connection reset");

        let action = h.reconciler.reconcile(&ObjectKey::new("default", "orders")).await.unwrap();

        // Tenant resolution is the first database call, so it reports the failure
        assert_eq!(action, Action::requeue(DEPENDENCY_REQUEUE));
        let status = h.streams.snapshot("default", "orders").unwrap().status.unwrap();
        let created = find_condition(&status.conditions, CONDITION_STREAM_CREATED).unwrap();
        assert_eq!(created.reason, "TenantError");
    }

    #[tokio::test]
    async fn test_reconcile_stream_without_gateway() {
        let streams = MemoryStore::new();
        let broker = MockBrokerAdmin::new();
        let reconciler = StreamReconciler::new(Arc::new(streams.clone()), None, Some(Arc::new(broker.clone())));
        streams.insert(create_test_stream("orders", "default", TENANT_ID, "orders"));

        let action = reconciler.reconcile(&ObjectKey::new("default", "orders")).await.unwrap();

        assert_eq!(action, Action::requeue(INFRASTRUCTURE_REQUEUE));
        assert!(broker.topics().is_empty());
        let status = streams.snapshot("default", "orders").unwrap().status.unwrap();
        assert_eq!(status.phase, StreamPhase::Pending);
        let ready = find_condition(&status.conditions, CONDITION_READY).unwrap();
        assert_eq!(ready.reason, "InfrastructureNotReady");
    }

    #[tokio::test]
    async fn test_reconcile_stream_without_broker() {
        let streams = MemoryStore::new();
        let gateway = MockGateway::new();
        gateway.add_tenant("acme", TENANT_ID);
        let reconciler = StreamReconciler::new(Arc::new(streams.clone()), Some(Arc::new(gateway)), None);
        streams.insert(create_test_stream("orders", "default", TENANT_ID, "orders"));

        reconciler.reconcile(&ObjectKey::new("default", "orders")).await.unwrap();

        let status = streams.snapshot("default", "orders").unwrap().status.unwrap();
        assert_eq!(status.phase, StreamPhase::Ready);
    }
}
