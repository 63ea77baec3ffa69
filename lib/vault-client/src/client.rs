use crate::error::VaultError;
use crate::models::Secret;
use reqwest::{Method, Url};
use std::time::Duration;

const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct VaultClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    namespace: Option<String>,
    timeout: Option<Duration>,
    timeout_value: Option<String>,
}

impl Default for VaultClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            namespace: None,
            timeout: None,
            timeout_value: None,
        }
    }

    /// Builder pre-filled from an environment lookup
    /// (`VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE`, `VAULT_CLIENT_TIMEOUT`).
    /// Empty values count as unset. Nothing else is read from the environment.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            base_url: get("VAULT_ADDR"),
            token: get("VAULT_TOKEN"),
            namespace: get("VAULT_NAMESPACE"),
            timeout: None,
            timeout_value: get("VAULT_CLIENT_TIMEOUT"),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn resolve_config(&self) -> Result<ResolvedConfig, VaultError> {
        let address = self
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let base_url = Url::parse(&address).map_err(|e| VaultError::InvalidAddress {
            address: address.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(VaultError::InvalidAddress {
                address,
                reason: "not a base URL".to_string(),
            });
        }

        let timeout = match (self.timeout, self.timeout_value.clone()) {
            (Some(timeout), _) => timeout,
            (None, value) => match value {
                Some(value) => humantime::parse_duration(&value)
                    .map_err(|source| VaultError::InvalidTimeout { value, source })?,
                None => DEFAULT_TIMEOUT,
            },
        };

        Ok(ResolvedConfig {
            base_url,
            token: self.token.clone(),
            namespace: self.namespace.clone(),
            timeout,
        })
    }

    pub fn build(self) -> Result<VaultClient, VaultError> {
        let config = self.resolve_config()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VaultError::RequestError(e.to_string()))?;

        Ok(VaultClient {
            base_url: config.base_url,
            token: config.token,
            namespace: config.namespace,
            http,
        })
    }
}

struct ResolvedConfig {
    base_url: Url,
    token: Option<String>,
    namespace: Option<String>,
    timeout: Duration,
}

/// Minimal Vault API client.
///
/// Clones share the connection pool. Each clone owns its token.
#[derive(Clone)]
pub struct VaultClient {
    base_url: Url,
    token: Option<String>,
    namespace: Option<String>,
    http: reqwest::Client,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl VaultClient {
    /// Client configured from the process environment
    pub fn from_env() -> Result<Self, VaultError> {
        VaultClientBuilder::with_lookup(|name| std::env::var(name).ok()).build()
    }

    pub fn builder() -> VaultClientBuilder {
        VaultClientBuilder::new()
    }

    pub fn address(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Sets the bearer token used for all following requests. Not validated.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// API URL of a logical path. Every segment is percent-encoded, so `#`,
    /// `?` and `%` stay part of the secret name.
    fn url(&self, path: &str) -> Result<Url, VaultError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                VaultError::RequestError(format!("Invalid Vault address {}", self.base_url))
            })?
            .pop_if_empty()
            .push("v1")
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Sends one request and decodes the response envelope.
    /// `204 No Content` and empty bodies yield `None`.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<Option<Secret>, VaultError> {
        let url = self.url(path)?;
        tracing::debug!(%method, path, "Vault request");

        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(ref token) = self.token {
            request = request.header("X-Vault-Token", token);
        }
        if let Some(ref namespace) = self.namespace {
            request = request.header("X-Vault-Namespace", namespace);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::RequestError(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| VaultError::RequestError(e.to_string()))?;

        if !status.is_success() {
            #[derive(serde::Deserialize)]
            struct ErrorResponse {
                #[serde(default)]
                errors: Vec<String>,
            }

            let errors = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.errors)
                .unwrap_or_default();
            return Err(VaultError::ClientError {
                status: status.as_u16(),
                errors,
            });
        }

        if status == reqwest::StatusCode::NO_CONTENT || body.is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Renews the client's own token. `increment` in seconds, 0 lets Vault pick.
    pub async fn renew_self(&self, increment: u64) -> Result<Secret, VaultError> {
        let body = serde_json::json!({ "increment": increment });
        self.send(Method::POST, "auth/token/renew-self", &[], Some(&body))
            .await?
            .ok_or_else(|| VaultError::RequestError("Empty renew-self response".to_string()))
    }
}
