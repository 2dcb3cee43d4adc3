//! Plugin startup: configuration loading, key selection, serving.

use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::net::TcpListener;

use stevedore_plugin_k8s::{ConnectionManager, ConnectionSettings, PluginConfig, SecretStore, StorageStore};

use crate::rpc::{self, PluginService};

/// Key the host uses to select the secrets implementation.
pub const SECRETS_PLUGIN_KEY: &str = "secrets.kubernetes.secrets";
/// Key the host uses to select the storage implementation.
pub const STORAGE_PLUGIN_KEY: &str = "storage.kubernetes.storage";

/// Version of the plugin wire protocol announced in the handshake.
const PLUGIN_PROTOCOL_VERSION: u32 = 1;

pub async fn run(key: &str) -> Result<()> {
    let config = load_config().context("could not load plugin configuration from stdin")?;
    tracing::debug!(namespace = ?config.namespace, key, "plugin configuration loaded");

    let settings = ConnectionSettings::from(&config);
    let service = match key {
        SECRETS_PLUGIN_KEY => {
            PluginService::secrets(SecretStore::new(ConnectionManager::new(settings)))
        }
        STORAGE_PLUGIN_KEY => {
            PluginService::storage(StorageStore::new(ConnectionManager::new(settings)))
        }
        other => bail!("invalid plugin key specified: {other:?}"),
    };

    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .context("could not bind plugin listener")?;
    let addr = listener.local_addr()?;

    // Handshake: the single stdout line the host parses to find us.
    println!("{PLUGIN_PROTOCOL_VERSION}|tcp|{addr}");

    rpc::serve(service, listener).await
}

fn load_config() -> Result<PluginConfig> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(PluginConfig::default());
    }
    Ok(PluginConfig::load(&mut stdin.lock())?)
}

#[derive(Serialize)]
struct Implementation {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
}

#[derive(Serialize)]
struct Metadata {
    name: &'static str,
    version: &'static str,
    author: &'static str,
    implementations: Vec<Implementation>,
}

pub fn print_version() -> Result<()> {
    let metadata = Metadata {
        name: "kubernetes",
        version: env!("CARGO_PKG_VERSION"),
        author: "Stevedore Authors",
        implementations: vec![
            Implementation {
                kind: "secrets",
                name: "secrets",
            },
            Implementation {
                kind: "storage",
                name: "storage",
            },
        ],
    };
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}
