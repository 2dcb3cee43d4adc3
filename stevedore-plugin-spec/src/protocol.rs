use async_trait::async_trait;

use crate::error::Result;

/// Runtime secret resolution surface the host drives over plugin RPC.
#[async_trait]
pub trait SecretsProtocol: Send + Sync {
    /// Resolve a `(source kind, key)` pair to a secret value.
    ///
    /// Source kinds other than `"secret"` belong to the host-side resolver
    /// and must be forwarded there unchanged.
    async fn resolve(&self, source_kind: &str, key: &str) -> Result<String>;

    /// Write-once creation of a named secret value. A second create for the
    /// same key fails; there is no silent update path.
    async fn create(&self, source_kind: &str, key: &str, value: &str) -> Result<()>;
}

/// Opaque record storage surface for installation records, claims and the
/// schema marker. Identity is `(item type, name)`; `group` only scopes
/// `list`/`count`.
#[async_trait]
pub trait StorageProtocol: Send + Sync {
    /// Create or update the record. First write creates; a name collision
    /// funnels into the update path.
    async fn save(&self, item_type: &str, group: &str, name: &str, data: &[u8]) -> Result<()>;

    /// Fetch the record's payload. An empty payload reads back as empty
    /// bytes, not as an error.
    async fn read(&self, item_type: &str, name: &str) -> Result<Vec<u8>>;

    /// Remove the record. Deleting a nonexistent record surfaces the backing
    /// store's native not-found error.
    async fn delete(&self, item_type: &str, name: &str) -> Result<()>;

    /// Logical names of all records with exactly this `(item type, group)`
    /// pair, in backing-store order.
    async fn list(&self, item_type: &str, group: &str) -> Result<Vec<String>>;

    /// Cardinality of [`StorageProtocol::list`] for the same selection.
    async fn count(&self, item_type: &str, group: &str) -> Result<usize>;
}
