//! Record storage backed by namespaced Kubernetes secrets.
//!
//! Records are addressed by `(item type, name)`. The physical object name is
//! the hex form of that pair, so the human identifiers are stamped on labels;
//! `list`/`count` select on the `group` and `type` labels and recover logical
//! names from the `name` label, which is the only channel that preserves
//! them. Payloads land gzip-compressed and base64-encoded in a single data
//! field named after the record.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tracing::debug;

use stevedore_plugin_spec::{Error, Result, StorageProtocol};

use crate::codec;
use crate::conn::{Connection, ConnectionManager};

const LABEL_NAME: &str = "name";
const LABEL_TYPE: &str = "type";
const LABEL_OWNER: &str = "owner";
const LABEL_GROUP: &str = "group";
const LABEL_CREATED: &str = "created";

/// Storage adapter for installation records, claims and the schema marker.
pub struct StorageStore {
    conn: ConnectionManager,
}

impl StorageStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Update path for [`StorageProtocol::save`]: fetch the current object by
    /// derived name, swap its data field for the new payload, write it back.
    async fn update(
        &self,
        conn: &Connection,
        item_type: &str,
        name: &str,
        encoded: &str,
    ) -> Result<()> {
        let resource = codec::resource_name(item_type, name);
        let mut secret = conn.api.get(&conn.namespace, &resource).await?;
        secret.data = Some(data_field(name, encoded));
        conn.api.replace(&conn.namespace, &resource, secret).await
    }
}

#[async_trait]
impl StorageProtocol for StorageStore {
    #[tracing::instrument(skip(self, data), fields(bytes = data.len()))]
    async fn save(&self, item_type: &str, group: &str, name: &str, data: &[u8]) -> Result<()> {
        let conn = self.conn.ensure().await?;
        let item_type = codec::qualify_item_type(item_type, name);

        let encoded = codec::encode_payload(data)?;
        if encoded.len() > codec::MAX_SECRET_SIZE {
            return Err(Error::PayloadTooLarge {
                name: name.to_string(),
                limit: codec::MAX_SECRET_SIZE,
            });
        }

        let secret = record_object(item_type, group, name, &encoded);
        match conn.api.create(&conn.namespace, secret).await {
            Ok(()) => Ok(()),
            Err(Error::AlreadyExists { .. }) => self.update(conn, item_type, name, &encoded).await,
            Err(err) => {
                debug!(item_type, group, name, %err, "failed to create record");
                Err(Error::api(
                    "save record",
                    format!("{item_type}/{name} in group {group:?}"),
                    err,
                ))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn read(&self, item_type: &str, name: &str) -> Result<Vec<u8>> {
        let conn = self.conn.ensure().await?;
        let item_type = codec::qualify_item_type(item_type, name);
        let resource = codec::resource_name(item_type, name);

        let secret = match conn.api.get(&conn.namespace, &resource).await {
            Ok(secret) => secret,
            Err(err) => {
                debug!(item_type, name, %err, "failed to read record");
                // Schema migration branches on the distinguished "no record"
                // class to detect a never-initialized store.
                if name == codec::SCHEMA_NAME && matches!(err, Error::NotFound { .. }) {
                    return Err(Error::RecordDoesNotExist);
                }
                return Err(err);
            }
        };

        let encoded = secret
            .data
            .as_ref()
            .and_then(|data| data.get(name))
            .map(|value| value.0.clone())
            .unwrap_or_default();
        let encoded = String::from_utf8(encoded).map_err(|err| {
            Error::Validation(format!(
                "record {item_type}/{name} holds a non-utf8 payload field: {err}"
            ))
        })?;
        codec::decode_payload(&encoded)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, item_type: &str, name: &str) -> Result<()> {
        let conn = self.conn.ensure().await?;
        let item_type = codec::qualify_item_type(item_type, name);
        conn.api
            .delete(&conn.namespace, &codec::resource_name(item_type, name))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, item_type: &str, group: &str) -> Result<Vec<String>> {
        let conn = self.conn.ensure().await?;
        let secrets = conn
            .api
            .list(&conn.namespace, &record_selector(item_type, group))
            .await?;

        // The logical name only survives on the label; hex names are one-way
        // without the item type alongside.
        Ok(secrets
            .iter()
            .map(|secret| {
                secret
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.get(LABEL_NAME))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn count(&self, item_type: &str, group: &str) -> Result<usize> {
        let conn = self.conn.ensure().await?;
        let secrets = conn
            .api
            .list(&conn.namespace, &record_selector(item_type, group))
            .await?;
        Ok(secrets.len())
    }
}

/// The `type` field cannot be used in get/list, so selection runs entirely
/// over labels.
fn record_selector(item_type: &str, group: &str) -> String {
    format!("group={group},type={item_type}")
}

fn data_field(name: &str, encoded: &str) -> BTreeMap<String, ByteString> {
    let mut data = BTreeMap::new();
    data.insert(name.to_string(), ByteString(encoded.as_bytes().to_vec()));
    data
}

fn record_object(item_type: &str, group: &str, name: &str, encoded: &str) -> Secret {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_NAME.to_string(), name.to_string());
    labels.insert(LABEL_TYPE.to_string(), item_type.to_string());
    labels.insert(LABEL_OWNER.to_string(), codec::OWNER.to_string());
    labels.insert(LABEL_GROUP.to_string(), group.to_string());
    labels.insert(LABEL_CREATED.to_string(), unix_now().to_string());

    Secret {
        metadata: ObjectMeta {
            name: Some(codec::resource_name(item_type, name)),
            labels: Some(labels),
            ..Default::default()
        },
        type_: Some(codec::secret_object_type(item_type)),
        data: Some(data_field(name, encoded)),
        ..Default::default()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
