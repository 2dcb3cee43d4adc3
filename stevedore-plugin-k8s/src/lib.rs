//! Kubernetes adapters for the Stevedore secrets and storage protocols.
//!
//! Both adapters persist into namespaced `Secret` objects: the storage
//! adapter maps abstract `(item type, group, name, bytes)` records onto
//! hex-named secrets with identifying labels, and the secrets adapter
//! resolves named values from secrets whose names mirror the keys the host
//! references. Secrets are used rather than config maps because the data may
//! be sensitive.
//!
//! Cluster access is acquired once per adapter instance by the connection
//! manager and reused for its lifetime; the adapters themselves hold no other
//! mutable state.

pub mod api;
pub mod codec;
pub mod config;
pub mod conn;
pub mod memory;
pub mod secrets;
pub mod storage;

pub use config::PluginConfig;
pub use conn::{Connection, ConnectionManager, ConnectionSettings};
pub use secrets::SecretStore;
pub use storage::StorageStore;
