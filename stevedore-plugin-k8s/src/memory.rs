//! In-process stand-in for the cluster API.
//!
//! Keeps whole secret objects in a namespace-to-name map and reproduces the
//! error classes the adapters branch on: already-exists on create, not-found
//! on get/replace/delete. The contract tests run both adapters against this
//! so the create-then-update and not-found paths are exercised without
//! cluster access.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;

use stevedore_plugin_spec::{Error, Result};

use crate::api::SecretsApi;

#[derive(Default)]
pub struct MemoryApi {
    objects: Mutex<HashMap<String, BTreeMap<String, Secret>>>,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }
}

fn object_name(secret: &Secret) -> String {
    secret.metadata.name.clone().unwrap_or_default()
}

fn matches_selector(secret: &Secret, selector: &str) -> bool {
    let empty = BTreeMap::new();
    let labels = secret.metadata.labels.as_ref().unwrap_or(&empty);
    selector.split(',').all(|term| match term.split_once('=') {
        Some((key, value)) => labels.get(key).map(String::as_str).unwrap_or("") == value,
        None => term.is_empty(),
    })
}

#[async_trait]
impl SecretsApi for MemoryApi {
    async fn create(&self, namespace: &str, secret: Secret) -> Result<()> {
        let name = object_name(&secret);
        let mut objects = self.objects.lock().expect("memory api poisoned");
        let namespace_objects = objects.entry(namespace.to_string()).or_default();
        if namespace_objects.contains_key(&name) {
            return Err(Error::AlreadyExists {
                entity: format!("secret {name}"),
            });
        }
        namespace_objects.insert(name, secret);
        Ok(())
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Secret> {
        let objects = self.objects.lock().expect("memory api poisoned");
        objects
            .get(namespace)
            .and_then(|namespace_objects| namespace_objects.get(name))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                entity: format!("secret {name}"),
            })
    }

    async fn replace(&self, namespace: &str, name: &str, secret: Secret) -> Result<()> {
        let mut objects = self.objects.lock().expect("memory api poisoned");
        let slot = objects
            .get_mut(namespace)
            .and_then(|namespace_objects| namespace_objects.get_mut(name))
            .ok_or_else(|| Error::NotFound {
                entity: format!("secret {name}"),
            })?;
        *slot = secret;
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let mut objects = self.objects.lock().expect("memory api poisoned");
        objects
            .get_mut(namespace)
            .and_then(|namespace_objects| namespace_objects.remove(name))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound {
                entity: format!("secret {name}"),
            })
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<Secret>> {
        let objects = self.objects.lock().expect("memory api poisoned");
        Ok(objects
            .get(namespace)
            .map(|namespace_objects| {
                namespace_objects
                    .values()
                    .filter(|secret| matches_selector(secret, label_selector))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
