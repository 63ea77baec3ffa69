use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Invalid Vault address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid value {value:?} for VAULT_CLIENT_TIMEOUT")]
    InvalidTimeout {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("Vault client error ({status}): {}", .errors.join(", "))]
    ClientError { status: u16, errors: Vec<String> },

    #[error("Vault request error: {0}")]
    RequestError(String),

    #[error("Secret is not renewable")]
    NotRenewable,

    #[error("Invalid refresh threshold {0}, expected a fraction of the lease")]
    InvalidRefreshThreshold(f64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    /// HTTP status of a Vault API error response, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ClientError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
