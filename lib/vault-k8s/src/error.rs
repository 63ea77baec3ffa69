use std::path::PathBuf;
use thiserror::Error;
use vault_client::VaultError;

#[derive(Debug, Error)]
pub enum K8sError {
    #[error("missing {name}")]
    MissingConfig { name: &'static str },

    #[error(
        "{value:?} is not a valid boolean for {name}: 1, t, T, TRUE, true, True, 0, f, F, FALSE, false, False are valid values"
    )]
    InvalidBool { name: &'static str, value: String },

    #[error("{value} is not a valid duration for {name}")]
    InvalidDuration {
        name: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("failed to create vault client")]
    Client(#[source] VaultError),

    #[error("failed to read jwt token from {path}")]
    ReadServiceAccountToken {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("login failed with role from environment variable VAULT_ROLE: {role:?}")]
    Login {
        role: String,
        #[source]
        source: VaultError,
    },

    #[error("login failed with: {}", .0.join(" - "))]
    LoginWarnings(Vec<String>),

    #[error("login response for role {role:?} carries no auth")]
    MissingAuth { role: String },

    #[error("failed to store token to {path}")]
    StoreToken {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load token from {path}")]
    LoadToken {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("found empty token in {path}")]
    EmptyToken { path: PathBuf },

    #[error("failed to renew token")]
    Renew(#[source] VaultError),

    #[error("failed to get token renewer")]
    Renewer(#[source] VaultError),
}
