//! vault-k8s - Vault authentication with the Kubernetes auth method
//!
//! Exchanges the pod's service account token for a Vault token and keeps a
//! locally stored session token alive (store, load, renew, re-authenticate).
//!
//! See the Kubernetes auth method in the Vault documentation:
//! <https://developer.hashicorp.com/vault/docs/auth/kubernetes>

mod env;
mod error;
mod vault;

pub use env::parse_bool;
pub use error::K8sError;
pub use vault::{AUTH_MOUNT_PATH, SERVICE_ACCOUNT_TOKEN_PATH, Vault, fix_auth_mount_path};
