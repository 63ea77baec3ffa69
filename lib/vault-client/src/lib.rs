//! vault-client - minimal async client for HashiCorp Vault
//!
//! Exposes the logical read/write/list API, the mount table, token
//! self-renewal and a background lease renewer.

mod client;
mod error;
mod lease;
mod logical;
mod models;
mod renewer;
mod sys;

pub use client::{VaultClient, VaultClientBuilder};
pub use error::VaultError;
pub use lease::Lease;
pub use logical::{Logical, LogicalWriter};
pub use models::{MountOutput, Secret, SecretAuth};
pub use renewer::{RenewEvent, Renewer, RenewerHandle, RenewerInput};
pub use sys::Sys;
