//! Host-side secret sources.
//!
//! Source kinds other than `"secret"` are the host's business, not the
//! cluster's: they resolve against the environment the plugin process runs
//! in. The k8s adapter forwards them here untouched.

use std::process::Command;

use crate::error::{Error, Result};

pub const SOURCE_VALUE: &str = "value";
pub const SOURCE_ENV: &str = "env";
pub const SOURCE_PATH: &str = "path";
pub const SOURCE_COMMAND: &str = "command";

/// Resolver for the source kinds the backing store has no opinion on.
pub trait HostResolver: Send + Sync {
    fn resolve(&self, source_kind: &str, key: &str) -> Result<String>;
}

/// Default host resolver covering the source kinds bundled with the
/// orchestrator: literal values, environment variables, file contents and
/// command output.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSecretSource;

impl HostResolver for HostSecretSource {
    fn resolve(&self, source_kind: &str, key: &str) -> Result<String> {
        match source_kind.to_ascii_lowercase().as_str() {
            SOURCE_VALUE => Ok(key.to_string()),
            SOURCE_ENV => std::env::var(key).map_err(|_| Error::NotFound {
                entity: format!("environment variable {key}"),
            }),
            SOURCE_PATH => std::fs::read_to_string(key).map_err(|err| {
                Error::Validation(format!("could not read secret file {key}: {err}"))
            }),
            SOURCE_COMMAND => run_command(key),
            other => Err(Error::Validation(format!(
                "invalid secret source kind: {other}"
            ))),
        }
    }
}

fn run_command(command: &str) -> Result<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|err| Error::Validation(format!("could not run secret command: {err}")))?;
    if !output.status.success() {
        return Err(Error::Validation(format!(
            "secret command exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    String::from_utf8(output.stdout)
        .map_err(|err| Error::Validation(format!("secret command produced non-utf8 output: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn value_source_echoes_the_key() {
        let resolved = HostSecretSource.resolve("value", "plain-text").unwrap();
        assert_eq!(resolved, "plain-text");
    }

    #[test]
    fn source_kind_comparison_is_case_insensitive() {
        let resolved = HostSecretSource.resolve("VALUE", "plain-text").unwrap();
        assert_eq!(resolved, "plain-text");
    }

    #[test]
    fn path_source_reads_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "hunter2").unwrap();
        let resolved = HostSecretSource
            .resolve("path", file.path().to_str().unwrap())
            .unwrap();
        assert_eq!(resolved, "hunter2");
    }

    #[test]
    fn missing_env_var_is_not_found() {
        let err = HostSecretSource
            .resolve("env", "STEVEDORE_TEST_UNSET_VARIABLE")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unknown_source_kind_is_rejected() {
        let err = HostSecretSource.resolve("vault", "anything").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
