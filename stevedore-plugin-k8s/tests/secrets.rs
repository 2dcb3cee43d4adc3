//! Contract tests for the secrets adapter against the in-process API.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;

use stevedore_plugin_k8s::api::SecretsApi;
use stevedore_plugin_k8s::memory::MemoryApi;
use stevedore_plugin_k8s::{ConnectionManager, SecretStore};
use stevedore_plugin_spec::{Error, HostResolver, SecretsProtocol};

const NAMESPACE: &str = "stevedore-test";

fn store_over(api: Arc<MemoryApi>) -> SecretStore {
    SecretStore::new(ConnectionManager::preconnected(api, NAMESPACE))
}

fn store() -> SecretStore {
    store_over(Arc::new(MemoryApi::new()))
}

#[tokio::test]
async fn create_then_resolve_round_trips() {
    let store = store();
    store.create("secret", "db-password", "hunter2").await.unwrap();
    assert_eq!(store.resolve("secret", "db-password").await.unwrap(), "hunter2");
}

#[tokio::test]
async fn resolve_sanitizes_the_requested_key() {
    let store = store();
    store.create("secret", "API_Token", "abc123").await.unwrap();
    // Both spellings land on the sanitized object name.
    assert_eq!(store.resolve("secret", "api-token").await.unwrap(), "abc123");
    assert_eq!(store.resolve("SECRET", "API_Token").await.unwrap(), "abc123");
}

#[tokio::test]
async fn create_is_write_once() {
    let store = store();
    store.create("secret", "db-password", "hunter2").await.unwrap();
    let err = store
        .create("secret", "db-password", "new-value")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));
    // The original value must be untouched.
    assert_eq!(store.resolve("secret", "db-password").await.unwrap(), "hunter2");
}

#[tokio::test]
async fn create_rejects_other_source_kinds() {
    let store = store();
    let err = store.create("env", "HOME", "x").await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedSourceKind { .. }));
}

#[tokio::test]
async fn create_rejects_oversized_values() {
    let store = store();
    let value = "x".repeat(2 * 1024 * 1024);
    let err = store.create("secret", "giant", &value).await.unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge { .. }));
}

#[tokio::test]
async fn missing_secret_is_not_found() {
    let store = store();
    let err = store.resolve("secret", "missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn wrong_data_field_is_an_actionable_validation_error() {
    let api = Arc::new(MemoryApi::new());
    // An object that exists but keeps its value under a different field:
    // the single most common misconfiguration.
    let mut data = std::collections::BTreeMap::new();
    data.insert("password".to_string(), ByteString(b"hunter2".to_vec()));
    api.create(
        NAMESPACE,
        Secret {
            metadata: ObjectMeta {
                name: Some("db-password".to_string()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let store = store_over(api);
    let err = store.resolve("secret", "db-password").await.unwrap_err();
    assert!(matches!(err, Error::WrongDataField { .. }));

    let message = err.to_string();
    assert!(message.contains(NAMESPACE));
    assert!(message.contains("db-password"));
    assert!(message.contains("value"));
}

struct EchoHost;

impl HostResolver for EchoHost {
    fn resolve(&self, source_kind: &str, key: &str) -> stevedore_plugin_spec::Result<String> {
        Ok(format!("{source_kind}:{key}"))
    }
}

#[tokio::test]
async fn other_source_kinds_are_delegated_to_the_host() {
    let store = SecretStore::with_host(
        ConnectionManager::preconnected(Arc::new(MemoryApi::new()), NAMESPACE),
        Box::new(EchoHost),
    );
    assert_eq!(store.resolve("env", "HOME").await.unwrap(), "env:HOME");
    assert_eq!(store.resolve("value", "plain").await.unwrap(), "value:plain");
}
