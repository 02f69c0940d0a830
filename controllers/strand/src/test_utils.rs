//! Test utilities for unit testing reconcilers
//!
//! Builders for every watched kind plus the Kubernetes objects the
//! reconcilers read (Secrets and Deployments).

use crds::*;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

/// Metadata with a name, namespace and a fresh UID
pub fn test_meta(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        uid: Some(uuid::Uuid::new_v4().to_string()),
        ..Default::default()
    }
}

/// Helper to create test StrandTenant CRD
pub fn create_test_tenant(name: &str, namespace: &str, display_name: Option<&str>) -> StrandTenant {
    StrandTenant {
        metadata: test_meta(name, namespace),
        spec: StrandTenantSpec {
            display_name: display_name.map(str::to_string),
            plan: None,
        },
        status: None,
    }
}

/// Helper to create test StrandStream CRD
pub fn create_test_stream(name: &str, namespace: &str, tenant_id: &str, stream_name: &str) -> StrandStream {
    StrandStream {
        metadata: test_meta(name, namespace),
        spec: StrandStreamSpec {
            tenant_id: tenant_id.to_string(),
            name: stream_name.to_string(),
            description: format!("{stream_name} events"),
            retention_days: 0,
        },
        status: None,
    }
}

/// Helper to create test StrandClient CRD
pub fn create_test_client(
    name: &str,
    namespace: &str,
    tenant_id: &str,
    client_id: &str,
    secret: Option<&str>,
) -> StrandClient {
    StrandClient {
        metadata: test_meta(name, namespace),
        spec: StrandClientSpec {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            stream_id: None,
            secret: secret.map(str::to_string),
        },
        status: None,
    }
}

/// Helper to create test StrandUser CRD
pub fn create_test_user(
    name: &str,
    namespace: &str,
    username: &str,
    tenant_id: &str,
    password: Option<&str>,
) -> StrandUser {
    StrandUser {
        metadata: test_meta(name, namespace),
        spec: StrandUserSpec {
            username: username.to_string(),
            password: password.map(str::to_string),
            tenant_id: tenant_id.to_string(),
            roles: vec!["admin".to_string()],
        },
        status: None,
    }
}

/// Helper to create test StrandDataPlane CRD pointing at a CockroachDB cluster
pub fn create_test_data_plane(name: &str, namespace: &str, password_ref: Option<&str>) -> StrandDataPlane {
    StrandDataPlane {
        metadata: test_meta(name, namespace),
        spec: StrandDataPlaneSpec {
            postgres_config: DatabaseConfig {
                host: "strand-cockroachdb".to_string(),
                port: 0,
                database: "stranddb".to_string(),
                user: "root".to_string(),
                password_ref: password_ref.map(str::to_string),
                ssl_mode: None,
                type_: DatabaseType::Cockroachdb,
            },
            broker_config: BrokerConfig {
                brokers: vec!["strand-redpanda:9092".to_string()],
                tls_enabled: false,
                tls_config_ref: None,
            },
        },
        status: None,
    }
}

/// Helper to create test StrandInit CRD
pub fn create_test_init(name: &str, namespace: &str, database_url: Option<&str>, gateways: &[&str]) -> StrandInit {
    StrandInit {
        metadata: test_meta(name, namespace),
        spec: StrandInitSpec {
            migrations_path: None,
            database_url: database_url.map(str::to_string),
            gateways: gateways.iter().map(|g| g.to_string()).collect(),
        },
        status: None,
    }
}

/// Helper to create test StrandAuthConfig CRD, optionally with a previously applied type
pub fn create_test_auth_config(
    name: &str,
    namespace: &str,
    type_: AuthType,
    previous_type: Option<AuthType>,
) -> StrandAuthConfig {
    let oidc_config = (type_ == AuthType::Oidc).then(|| OidcConfig {
        issuer_url: "https://issuer.example.com".to_string(),
        client_id: "strand".to_string(),
        client_secret_ref: "strand-oidc".to_string(),
        scopes: vec!["openid".to_string()],
    });
    StrandAuthConfig {
        metadata: test_meta(name, namespace),
        spec: StrandAuthConfigSpec { type_, oidc_config },
        status: previous_type.map(|previous| StrandAuthConfigStatus {
            phase: AuthConfigPhase::Active,
            previous_type: Some(previous),
            conditions: Vec::new(),
        }),
    }
}

/// Helper to create a Deployment with the given number of available replicas
pub fn create_test_deployment(name: &str, namespace: &str, available: i32) -> Deployment {
    Deployment {
        metadata: test_meta(name, namespace),
        status: Some(DeploymentStatus {
            available_replicas: Some(available),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Helper to create an Opaque Secret with the given data
pub fn create_test_secret(name: &str, namespace: &str, data: &[(&str, &str)]) -> Secret {
    let data: BTreeMap<String, ByteString> = data
        .iter()
        .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
        .collect();
    Secret {
        metadata: test_meta(name, namespace),
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}
