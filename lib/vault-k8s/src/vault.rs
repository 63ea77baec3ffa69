use crate::{K8sError, env};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use vault_client::{LogicalWriter, Renewer, RenewerInput, VaultClient, VaultClientBuilder};

pub const AUTH_MOUNT_PATH: &str = "auth/kubernetes";
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Configuration to obtain a valid Vault token with the Kubernetes auth method
pub struct Vault {
    pub role: String,
    pub token_path: PathBuf,
    pub reauth: bool,
    /// Increment in seconds requested on renew-self
    pub ttl: u64,
    pub auth_mount_path: String,
    pub service_account_token_path: PathBuf,
    /// Hint for callers that a failed authentication is not fatal
    pub allow_fail: bool,
    client: VaultClient,
    login_writer: Option<Arc<dyn LogicalWriter>>,
}

impl Vault {
    /// Reads the configuration from the process environment
    pub fn from_env() -> Result<Self, K8sError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, K8sError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_path = env::value(&lookup, "VAULT_TOKEN_PATH").ok_or(K8sError::MissingConfig {
            name: "VAULT_TOKEN_PATH",
        })?;

        let auth_mount_path = env::value(&lookup, "VAULT_AUTH_MOUNT_PATH")
            .unwrap_or_else(|| AUTH_MOUNT_PATH.to_string());

        let service_account_token_path = env::value(&lookup, "SERVICE_ACCOUNT_TOKEN_PATH")
            .unwrap_or_else(|| SERVICE_ACCOUNT_TOKEN_PATH.to_string());

        let vault = Self {
            role: env::value(&lookup, "VAULT_ROLE").unwrap_or_default(),
            token_path: PathBuf::from(token_path),
            reauth: env::flag(&lookup, "VAULT_REAUTH")?,
            ttl: env::seconds(&lookup, "VAULT_TTL")?,
            auth_mount_path: fix_auth_mount_path(&auth_mount_path),
            service_account_token_path: PathBuf::from(service_account_token_path),
            allow_fail: env::flag(&lookup, "ALLOW_FAIL")?,
            client: VaultClientBuilder::with_lookup(&lookup)
                .build()
                .map_err(K8sError::Client)?,
            login_writer: None,
        };

        tracing::debug!(
            role = %vault.role,
            auth_mount_path = %vault.auth_mount_path,
            token_path = %vault.token_path.display(),
            reauth = vault.reauth,
            ttl = vault.ttl,
            "Vault configuration loaded"
        );

        Ok(vault)
    }

    /// Uses `writer` instead of the Vault client for the login call
    pub fn with_login_writer(mut self, writer: impl LogicalWriter + 'static) -> Self {
        self.login_writer = Some(Arc::new(writer));
        self
    }

    pub fn client(&self) -> &VaultClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut VaultClient {
        &mut self.client
    }

    fn login_writer(&self) -> &dyn LogicalWriter {
        match self.login_writer {
            Some(ref writer) => writer.as_ref(),
            None => &self.client,
        }
    }

    fn read_jwt(&self) -> Result<String, K8sError> {
        std::fs::read_to_string(&self.service_account_token_path)
            .map(|s| s.trim().to_string())
            .map_err(|source| K8sError::ReadServiceAccountToken {
                path: self.service_account_token_path.clone(),
                source,
            })
    }

    /// Logs in with the service account token and returns the client token
    pub async fn authenticate(&self) -> Result<String, K8sError> {
        let jwt = self.read_jwt()?;

        let data = HashMap::from([
            ("role".to_string(), serde_json::Value::from(self.role.clone())),
            ("jwt".to_string(), serde_json::Value::from(jwt)),
        ]);
        let path = format!("{}/login", fix_auth_mount_path(&self.auth_mount_path));

        let secret = self
            .login_writer()
            .write(&path, data)
            .await
            .map_err(|source| K8sError::Login {
                role: self.role.clone(),
                source,
            })?;

        let missing_auth = || K8sError::MissingAuth {
            role: self.role.clone(),
        };
        let secret = secret.ok_or_else(missing_auth)?;
        if !secret.warnings.is_empty() {
            return Err(K8sError::LoginWarnings(secret.warnings));
        }
        let auth = secret.auth.ok_or_else(missing_auth)?;

        tracing::info!(role = %self.role, path = %path, "Authenticated with Kubernetes auth method");
        Ok(auth.client_token)
    }

    /// Stores the token in `token_path`, readable and writable by the owner only
    pub fn store_token(&self, token: &str) -> Result<(), K8sError> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let store_err = |source| K8sError::StoreToken {
            path: self.token_path.clone(),
            source,
        };
        let mut file = options.open(&self.token_path).map_err(store_err)?;
        std::io::Write::write_all(&mut file, token.as_bytes()).map_err(store_err)
    }

    /// Loads the token from `token_path`. An empty file is an error.
    pub fn load_token(&self) -> Result<String, K8sError> {
        let content = std::fs::read(&self.token_path).map_err(|source| K8sError::LoadToken {
            path: self.token_path.clone(),
            source,
        })?;
        if content.is_empty() {
            return Err(K8sError::EmptyToken {
                path: self.token_path.clone(),
            });
        }
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    /// Sets the token on the client without validating it
    pub fn use_token(&mut self, token: impl Into<String>) {
        self.client.set_token(token);
    }

    /// Loads the stored token and renews it. Falls back to a fresh login when
    /// loading or renewing fails and `reauth` is set.
    pub async fn get_token(&mut self) -> Result<String, K8sError> {
        let token = match self.load_token() {
            Ok(token) => token,
            Err(e) if self.reauth => {
                tracing::warn!("Stored token unusable, re-authenticating: {}", e);
                return self.authenticate().await;
            }
            Err(e) => return Err(e),
        };

        self.client.set_token(token.clone());
        match self.client.renew_self(self.ttl).await {
            Ok(_) => Ok(token),
            Err(e) if self.reauth => {
                tracing::warn!("Token renewal failed, re-authenticating: {}", e);
                self.authenticate().await
            }
            Err(e) => Err(K8sError::Renew(e)),
        }
    }

    /// Renews `token` once and returns a renewer for the resulting lease.
    /// The caller starts and drives the renewer.
    pub async fn new_renewer(&mut self, token: impl Into<String>) -> Result<Renewer, K8sError> {
        self.client.set_token(token);
        let secret = self
            .client
            .renew_self(self.ttl)
            .await
            .map_err(K8sError::Renew)?;

        Renewer::new(self.client.clone(), RenewerInput::new(secret, self.ttl))
            .map_err(K8sError::Renewer)
    }
}

/// Adds the `auth` prefix to a mount path
///
/// kubernetes      -> auth/kubernetes
/// auth/kubernetes -> auth/kubernetes
///
/// presumes a valid path
pub fn fix_auth_mount_path(p: &str) -> String {
    let segments: Vec<&str> = p
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    if segments.first() == Some(&"auth") {
        return segments.join("/");
    }
    std::iter::once("auth")
        .chain(segments)
        .collect::<Vec<_>>()
        .join("/")
}
