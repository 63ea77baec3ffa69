//! vault-kv - version agnostic read, write and list for Vault's KV secret engines
//!
//! [`Client::new`] looks up the engine serving a path in the mount table and
//! every following call is rewritten for that engine's API: KV version 2
//! paths get `data/` or `metadata/` after the mount and payloads are wrapped
//! in `data`, KV version 1 (and `generic`) paths pass through unchanged.

mod client;
mod error;
mod path;

pub use client::{Client, KvVersion};
pub use error::KvError;
pub use path::{LIST_PREFIX, READ_PREFIX, WRITE_PREFIX, fix_path};
