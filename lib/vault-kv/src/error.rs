use thiserror::Error;
use vault_client::VaultError;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("path {path} must contain at least one '/'")]
    MissingSeparator { path: String },

    #[error("path {path} must not start with '/'")]
    LeadingSlash { path: String },

    #[error("failed to get mount for path: {path}")]
    NoMount { path: String },

    #[error("matching mount {mount} for path {path} is not of type kv")]
    NotKv { mount: String, path: String },

    #[error("matching mount {mount} for path {path} has invalid kv version: {version:?}")]
    InvalidVersion {
        mount: String,
        path: String,
        version: Option<String>,
    },

    #[error("unexpected response for path {path}: {reason}")]
    MalformedResponse { path: String, reason: String },

    #[error("request to {path} failed")]
    Vault {
        path: String,
        #[source]
        source: VaultError,
    },
}

impl KvError {
    pub(crate) fn vault(path: &str) -> impl FnOnce(VaultError) -> Self + '_ {
        move |source| Self::Vault {
            path: path.to_string(),
            source,
        }
    }
}
