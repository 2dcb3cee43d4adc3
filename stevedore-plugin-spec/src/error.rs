use thiserror::Error;

/// Result alias for plugin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical error surface for plugin operations.
///
/// Variants are `Clone`-able string payloads so a connection manager can
/// cache its first failure and tests can assert on exact values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Namespace or client construction failed; fatal to the triggering call.
    #[error("cluster configuration error: {0}")]
    Configuration(String),
    /// The backing store has no object under the derived name.
    #[error("{entity} not found")]
    NotFound { entity: String },
    /// Normalized not-found for the schema marker, so migration logic can
    /// detect a never-initialized store regardless of backend wording.
    #[error("record does not exist")]
    RecordDoesNotExist,
    /// Create collided with an existing object of the same name.
    #[error("{entity} already exists")]
    AlreadyExists { entity: String },
    /// The secret object exists but its value sits under a different field.
    #[error(
        "the secret {namespace}/{key} does not have a key named {field}. The kubernetes \
         secrets plugin requires that the Kubernetes secret is named after the secret \
         referenced in the Stevedore parameter or credential set, and that the secret \
         value is stored under a key named {field}"
    )]
    WrongDataField {
        namespace: String,
        key: String,
        field: &'static str,
    },
    #[error("secret {name} exceeds the maximum secret size of {limit} bytes")]
    PayloadTooLarge { name: String, limit: usize },
    #[error("unsupported secret source kind: {kind}. Only \"secret\" is supported")]
    UnsupportedSourceKind { kind: String },
    #[error("{0}")]
    Validation(String),
    /// Any other backing-store failure, wrapped with the operation and the
    /// identifiers it was acting on.
    #[error("{operation} {entity}: {message}")]
    Api {
        operation: String,
        entity: String,
        message: String,
    },
}

impl Error {
    /// True for both not-found classes, normalized and native.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::RecordDoesNotExist)
    }

    pub fn api(
        operation: impl Into<String>,
        entity: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Error::Api {
            operation: operation.into(),
            entity: entity.into(),
            message: message.to_string(),
        }
    }
}
