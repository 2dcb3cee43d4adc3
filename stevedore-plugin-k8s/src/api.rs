//! Seam between the adapters and the cluster.
//!
//! The adapters only ever need namespaced secret CRUD with exact-match label
//! selection, so that is all this trait exposes. Backing-store error classes
//! the adapters branch on (already-exists, not-found) are folded into the
//! plugin taxonomy here, at the boundary.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::core::ErrorResponse;
use kube::Client;

use stevedore_plugin_spec::{Error, Result};

/// Namespaced secret CRUD as the adapters consume it.
#[async_trait]
pub trait SecretsApi: Send + Sync {
    /// Create the object; fails with [`Error::AlreadyExists`] on collision.
    async fn create(&self, namespace: &str, secret: Secret) -> Result<()>;

    /// Fetch by exact name; fails with [`Error::NotFound`] when absent.
    async fn get(&self, namespace: &str, name: &str) -> Result<Secret>;

    /// Replace an existing object wholesale.
    async fn replace(&self, namespace: &str, name: &str, secret: Secret) -> Result<()>;

    /// Delete by exact name; absent objects fail with [`Error::NotFound`].
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;

    /// All objects matching the exact label selector, in API order.
    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<Secret>>;
}

/// Live implementation over the Kubernetes API.
#[derive(Clone)]
pub struct KubeApi {
    client: Client,
}

impl KubeApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Confirm the target namespace exists before caching the connection.
    pub async fn namespace_exists(&self, namespace: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.get(namespace)
            .await
            .map(|_| ())
            .map_err(|err| map_error("get namespace", format!("namespace {namespace}"), err))
    }
}

#[async_trait]
impl SecretsApi for KubeApi {
    async fn create(&self, namespace: &str, secret: Secret) -> Result<()> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.secrets(namespace)
            .create(&PostParams::default(), &secret)
            .await
            .map(|_| ())
            .map_err(|err| map_error("create secret", format!("secret {name}"), err))
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.secrets(namespace)
            .get(name)
            .await
            .map_err(|err| map_error("get secret", format!("secret {name}"), err))
    }

    async fn replace(&self, namespace: &str, name: &str, secret: Secret) -> Result<()> {
        self.secrets(namespace)
            .replace(name, &PostParams::default(), &secret)
            .await
            .map(|_| ())
            .map_err(|err| map_error("replace secret", format!("secret {name}"), err))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.secrets(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|err| map_error("delete secret", format!("secret {name}"), err))
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<Secret>> {
        let params = ListParams::default().labels(label_selector);
        self.secrets(namespace)
            .list(&params)
            .await
            .map(|list| list.items)
            .map_err(|err| map_error("list secrets", format!("selector {label_selector}"), err))
    }
}

fn map_error(operation: &str, entity: String, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ErrorResponse { ref reason, .. }) if reason == "AlreadyExists" => {
            Error::AlreadyExists { entity }
        }
        kube::Error::Api(ErrorResponse { ref reason, .. }) if reason == "NotFound" => {
            Error::NotFound { entity }
        }
        other => Error::api(operation, entity, other),
    }
}
