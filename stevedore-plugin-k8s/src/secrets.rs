//! Secret resolution and write-once creation over Kubernetes secrets.
//!
//! Only the `"secret"` source kind touches the cluster: the key is sanitized
//! into a legal object name and the value is read from the well-known
//! `value` data field. Every other source kind is forwarded to the
//! host-provided resolver untouched.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tracing::debug;

use stevedore_plugin_spec::host::{HostResolver, HostSecretSource};
use stevedore_plugin_spec::{Error, Result, SecretsProtocol};

use crate::codec;
use crate::conn::ConnectionManager;

/// Secrets adapter for resolving and creating named values.
pub struct SecretStore {
    conn: ConnectionManager,
    host: Box<dyn HostResolver>,
}

impl SecretStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_host(conn, Box::new(HostSecretSource))
    }

    /// Swap the delegate for non-`"secret"` source kinds.
    pub fn with_host(conn: ConnectionManager, host: Box<dyn HostResolver>) -> Self {
        Self { conn, host }
    }
}

#[async_trait]
impl SecretsProtocol for SecretStore {
    #[tracing::instrument(skip(self))]
    async fn resolve(&self, source_kind: &str, key: &str) -> Result<String> {
        if !source_kind.eq_ignore_ascii_case(codec::SECRET_SOURCE_KIND) {
            return self.host.resolve(source_kind, key);
        }

        let conn = self.conn.ensure().await?;
        let sanitized = codec::sanitize_key(key);
        debug!(namespace = %conn.namespace, key, sanitized = %sanitized, "resolving secret");

        let secret = conn
            .api
            .get(&conn.namespace, &sanitized)
            .await
            .map_err(|err| match err {
                Error::NotFound { .. } => err,
                other => Error::api("resolve secret", key, other),
            })?;

        match secret
            .data
            .as_ref()
            .and_then(|data| data.get(codec::SECRET_DATA_KEY))
        {
            Some(value) => String::from_utf8(value.0.clone()).map_err(|err| {
                Error::Validation(format!("secret {key} holds a non-utf8 value: {err}"))
            }),
            None => Err(Error::WrongDataField {
                namespace: conn.namespace.clone(),
                key: key.to_string(),
                field: codec::SECRET_DATA_KEY,
            }),
        }
    }

    #[tracing::instrument(skip(self, value))]
    async fn create(&self, source_kind: &str, key: &str, value: &str) -> Result<()> {
        if !source_kind.eq_ignore_ascii_case(codec::SECRET_SOURCE_KIND) {
            return Err(Error::UnsupportedSourceKind {
                kind: source_kind.to_string(),
            });
        }
        if value.len() > codec::MAX_SECRET_SIZE {
            return Err(Error::PayloadTooLarge {
                name: key.to_string(),
                limit: codec::MAX_SECRET_SIZE,
            });
        }

        let conn = self.conn.ensure().await?;
        debug!(namespace = %conn.namespace, key, "creating secret");

        // Write-once: immutable at creation, duplicate creates surface as-is.
        conn.api
            .create(&conn.namespace, secret_object(key, value))
            .await
    }
}

fn secret_object(key: &str, value: &str) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(
        codec::SECRET_DATA_KEY.to_string(),
        ByteString(value.as_bytes().to_vec()),
    );

    Secret {
        metadata: ObjectMeta {
            name: Some(codec::sanitize_key(key)),
            ..Default::default()
        },
        immutable: Some(true),
        data: Some(data),
        ..Default::default()
    }
}
