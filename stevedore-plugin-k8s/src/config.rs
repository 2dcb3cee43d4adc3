//! Plugin configuration delivered by the host on stdin at startup.

use std::io::Read;
use std::path::PathBuf;

use serde::Deserialize;

use stevedore_plugin_spec::{Error, Result};

/// Per-deployment settings. Absent or empty input is valid and means "use
/// defaults". Unknown fields are rejected rather than silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    /// Namespace in the cluster that holds the plugin's records and secrets.
    /// Defaults to the namespace the plugin itself runs in.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Path to a kubeconfig granting access to the target cluster. Defaults
    /// to `$KUBECONFIG`, then `~/.kube/config`, then in-cluster credentials.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

impl PluginConfig {
    /// Read the serialized configuration off `reader` until EOF.
    pub fn load(reader: &mut impl Read) -> Result<Self> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw).map_err(|err| {
            Error::Configuration(format!("could not read plugin configuration: {err}"))
        })?;

        if raw.is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_slice(&raw).map_err(|err| {
            Error::Configuration(format!(
                "error decoding plugin configuration {:?}: {err}",
                String::from_utf8_lossy(&raw)
            ))
        })
    }
}
