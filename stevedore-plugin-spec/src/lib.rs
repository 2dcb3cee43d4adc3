//! Contracts for Stevedore secrets and storage plugins.
//!
//! A plugin implements one or both of the protocol traits in this crate and
//! is loaded out-of-process by the Stevedore host, which drives it over the
//! plugin RPC surface. The error enum is the shared taxonomy both sides
//! branch on; everything here is backend-agnostic.

pub mod error;
pub mod host;
pub mod protocol;

pub use error::{Error, Result};
pub use host::{HostResolver, HostSecretSource};
pub use protocol::{SecretsProtocol, StorageProtocol};
