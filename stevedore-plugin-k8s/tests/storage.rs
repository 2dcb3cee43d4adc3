//! Contract tests for the storage adapter, run against the in-process API so
//! the create/update and not-found paths are exercised without a cluster.

use std::sync::Arc;

use stevedore_plugin_k8s::memory::MemoryApi;
use stevedore_plugin_k8s::{ConnectionManager, StorageStore};
use stevedore_plugin_spec::{Error, StorageProtocol};

const NAMESPACE: &str = "stevedore-test";

fn store() -> StorageStore {
    StorageStore::new(ConnectionManager::preconnected(
        Arc::new(MemoryApi::new()),
        NAMESPACE,
    ))
}

#[tokio::test]
async fn installations_without_group_or_data() {
    let store = store();
    let installations = ["installation1", "installation2", "installation3"];

    for name in installations {
        store.save("installations", "", name, &[]).await.unwrap();
    }

    for name in installations {
        let data = store.read("installations", name).await.unwrap();
        assert_eq!(data, Vec::<u8>::new());
    }

    let mut listed = store.list("installations", "").await.unwrap();
    listed.sort();
    assert_eq!(listed, installations);
    assert_eq!(store.count("installations", "").await.unwrap(), 3);

    for name in installations {
        store.delete("installations", name).await.unwrap();
    }
    assert_eq!(store.count("installations", "").await.unwrap(), 0);

    let err = store.read("installations", "installation1").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn save_then_read_returns_the_bytes_last_saved() {
    let store = store();

    store
        .save("claims", "test1", "claim1", b"first revision")
        .await
        .unwrap();
    assert_eq!(
        store.read("claims", "claim1").await.unwrap(),
        b"first revision"
    );

    // The second save collides on the physical name and must take the
    // update path rather than failing or keeping the old payload.
    store
        .save("claims", "test1", "claim1", b"second revision")
        .await
        .unwrap();
    assert_eq!(
        store.read("claims", "claim1").await.unwrap(),
        b"second revision"
    );
    assert_eq!(store.count("claims", "test1").await.unwrap(), 1);
}

#[tokio::test]
async fn schema_marker_defaults_its_item_type() {
    let store = store();

    let err = store.read("", "schema").await.unwrap_err();
    assert_eq!(err, Error::RecordDoesNotExist);

    store.save("", "", "schema", b"v1").await.unwrap();
    assert_eq!(store.read("", "schema").await.unwrap(), b"v1");

    store.save("", "", "schema", b"v2").await.unwrap();
    assert_eq!(store.read("", "schema").await.unwrap(), b"v2");

    // Addressing with the explicit item type hits the same record.
    assert_eq!(store.read("schema", "schema").await.unwrap(), b"v2");

    store.delete("", "schema").await.unwrap();
    assert_eq!(
        store.read("", "schema").await.unwrap_err(),
        Error::RecordDoesNotExist
    );
}

#[tokio::test]
async fn only_schema_reads_are_normalized() {
    let store = store();
    let err = store.read("installations", "missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_ne!(err, Error::RecordDoesNotExist);
}

#[tokio::test]
async fn groups_partition_listing_but_not_identity() {
    let store = store();

    for name in ["claim1", "claim2", "claim3"] {
        store
            .save("claims", "test1", name, name.as_bytes())
            .await
            .unwrap();
    }
    for name in ["claim4", "claim5"] {
        store
            .save("claims", "test2", name, name.as_bytes())
            .await
            .unwrap();
    }

    let mut group1 = store.list("claims", "test1").await.unwrap();
    group1.sort();
    assert_eq!(group1, ["claim1", "claim2", "claim3"]);
    assert_eq!(store.count("claims", "test1").await.unwrap(), 3);

    let mut group2 = store.list("claims", "test2").await.unwrap();
    group2.sort();
    assert_eq!(group2, ["claim4", "claim5"]);
    assert_eq!(store.count("claims", "test2").await.unwrap(), 2);

    // Reads ignore the group entirely.
    assert_eq!(store.read("claims", "claim4").await.unwrap(), b"claim4");
}

#[tokio::test]
async fn deleting_a_missing_record_surfaces_the_native_not_found() {
    let store = store();
    let err = store.delete("installations", "missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn payloads_survive_arbitrary_bytes() {
    let store = store();
    let payload: Vec<u8> = (0..=255).cycle().take(10_000).collect();
    store
        .save("outputs", "", "binary-output", &payload)
        .await
        .unwrap();
    assert_eq!(store.read("outputs", "binary-output").await.unwrap(), payload);
}

#[tokio::test]
async fn oversized_payloads_are_rejected_before_any_write() {
    let store = store();

    // Incompressible bytes from a deterministic xorshift stream keep the
    // encoded form well above the object size ceiling.
    let mut state = 0x9e3779b97f4a7c15u64;
    let mut payload = Vec::with_capacity(2_000_000);
    while payload.len() < 2_000_000 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        payload.extend_from_slice(&state.to_le_bytes());
    }

    let err = store
        .save("installations", "", "giant", &payload)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge { .. }));
    assert!(matches!(
        store.read("installations", "giant").await.unwrap_err(),
        Error::NotFound { .. }
    ));
}
