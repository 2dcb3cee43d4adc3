//! Lazily-established, once-per-instance connection to the cluster.
//!
//! Configuration resolves in priority order: explicit namespace from the
//! plugin config, then the pod's service-account namespace file. The client
//! comes from an explicit kubeconfig, `$KUBECONFIG`, `~/.kube/config`, or
//! in-cluster credentials when no kubeconfig file exists. The first
//! connection outcome, success or failure, is cached for the adapter's
//! lifetime; callers construct a new adapter to retry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use stevedore_plugin_spec::{Error, Result};

use crate::api::{KubeApi, SecretsApi};
use crate::config::PluginConfig;

/// Pod-local file naming the namespace the plugin itself runs in.
const SERVICE_ACCOUNT_NAMESPACE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// An established handle: the API capability plus the resolved namespace.
#[derive(Clone)]
pub struct Connection {
    pub api: Arc<dyn SecretsApi>,
    pub namespace: String,
}

/// Inputs the connection is built from, extracted from [`PluginConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
}

impl From<&PluginConfig> for ConnectionSettings {
    fn from(config: &PluginConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            kubeconfig: config.kubeconfig.clone(),
        }
    }
}

/// One-shot connection guard owned by each adapter instance. Concurrent
/// cold-start callers await a single attempt and observe its outcome.
pub struct ConnectionManager {
    settings: ConnectionSettings,
    state: OnceCell<std::result::Result<Connection, Error>>,
}

impl ConnectionManager {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            state: OnceCell::new(),
        }
    }

    /// A manager that is already connected. Lets embedders and the contract
    /// tests supply their own [`SecretsApi`] without cluster access.
    pub fn preconnected(api: Arc<dyn SecretsApi>, namespace: impl Into<String>) -> Self {
        let state = OnceCell::new();
        state
            .set(Ok(Connection {
                api,
                namespace: namespace.into(),
            }))
            .ok();
        Self {
            settings: ConnectionSettings::default(),
            state,
        }
    }

    /// Idempotent connect. The first outcome is permanent for this instance.
    pub async fn ensure(&self) -> Result<&Connection> {
        let state = self
            .state
            .get_or_init(|| async { establish(&self.settings).await })
            .await;
        match state {
            Ok(connection) => Ok(connection),
            Err(err) => Err(err.clone()),
        }
    }
}

async fn establish(settings: &ConnectionSettings) -> std::result::Result<Connection, Error> {
    let namespace = resolve_namespace(
        settings.namespace.as_deref(),
        Path::new(SERVICE_ACCOUNT_NAMESPACE),
    )?;
    let client = build_client(settings).await?;
    let api = KubeApi::new(client);
    api.namespace_exists(&namespace)
        .await
        .map_err(|err| Error::Configuration(err.to_string()))?;
    info!(namespace = %namespace, "connected to cluster");
    Ok(Connection {
        api: Arc::new(api),
        namespace,
    })
}

fn resolve_namespace(explicit: Option<&str>, service_account_file: &Path) -> Result<String> {
    if let Some(namespace) = explicit {
        if !namespace.is_empty() {
            return Ok(namespace.to_string());
        }
    }

    match std::fs::read_to_string(service_account_file) {
        Ok(contents) if !contents.trim().is_empty() => Ok(contents.trim().to_string()),
        Ok(_) => Err(Error::Configuration(format!(
            "service account namespace at {} is empty",
            service_account_file.display()
        ))),
        Err(err) => Err(Error::Configuration(format!(
            "no namespace configured and the service account namespace at {} could not be read: {err}",
            service_account_file.display()
        ))),
    }
}

/// Which kubeconfig file to try, if any: explicit plugin config beats
/// `$KUBECONFIG` beats the home-directory default.
fn kubeconfig_path(
    explicit: Option<&Path>,
    env_value: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_value {
        if !path.as_os_str().is_empty() {
            return Some(path);
        }
    }
    home.map(|home| home.join(".kube").join("config"))
}

async fn build_client(settings: &ConnectionSettings) -> Result<Client> {
    let path = kubeconfig_path(
        settings.kubeconfig.as_deref(),
        std::env::var_os("KUBECONFIG").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    );

    let config = match path {
        Some(path) if path.exists() => {
            info!(file = %path.display(), "using kubeconfig");
            let kubeconfig = Kubeconfig::read_from(&path).map_err(|err| {
                Error::Configuration(format!(
                    "could not read kubeconfig {}: {err}",
                    path.display()
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|err| {
                    Error::Configuration(format!(
                        "could not load kubeconfig {}: {err}",
                        path.display()
                    ))
                })?
        }
        other => {
            if let Some(path) = other {
                debug!(file = %path.display(), "kubeconfig does not exist, falling back to in-cluster configuration");
            }
            Config::incluster().map_err(|err| {
                Error::Configuration(format!("could not load in-cluster configuration: {err}"))
            })?
        }
    };

    Client::try_from(config)
        .map_err(|err| Error::Configuration(format!("could not build cluster client: {err}")))
}
