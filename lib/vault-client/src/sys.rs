use crate::VaultError;
use crate::client::VaultClient;
use crate::models::MountOutput;
use async_trait::async_trait;
use reqwest::Method;
use std::collections::HashMap;

/// Mount table access
#[async_trait]
pub trait Sys: Send + Sync {
    /// Mounted secret engines keyed by path prefix, e.g. `secret/`
    async fn list_mounts(&self) -> Result<HashMap<String, MountOutput>, VaultError>;
}

#[async_trait]
impl Sys for VaultClient {
    async fn list_mounts(&self) -> Result<HashMap<String, MountOutput>, VaultError> {
        let data = self
            .send(Method::GET, "sys/mounts", &[], None)
            .await?
            .and_then(|secret| secret.data)
            .ok_or_else(|| VaultError::RequestError("Empty sys/mounts response".to_string()))?;

        let mounts = data
            .into_iter()
            .map(|(path, mount)| Ok((path, serde_json::from_value(mount)?)))
            .collect::<Result<HashMap<_, _>, VaultError>>()?;

        Ok(mounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_list_mounts_reads_data() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/sys/mounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "request_id": "id",
                "data": {
                    "secret/": { "type": "kv", "description": "key/value secret storage", "options": { "version": "2" } },
                    "cubbyhole/": { "type": "cubbyhole", "description": "per-token", "options": null }
                },
                "warnings": null
            })))
            .mount(&mock_server)
            .await;

        let client = VaultClient::builder()
            .base_url(mock_server.uri())
            .token("test-token")
            .build()
            .unwrap();

        let mounts = client.list_mounts().await.unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts["secret/"].mount_type, "kv");
        assert_eq!(mounts["secret/"].option("version"), Some("2"));
        assert_eq!(mounts["cubbyhole/"].mount_type, "cubbyhole");
    }

    #[tokio::test]
    async fn test_list_mounts_permission_denied() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/sys/mounts"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "errors": ["permission denied"]
            })))
            .mount(&mock_server)
            .await;

        let client = VaultClient::builder()
            .base_url(mock_server.uri())
            .build()
            .unwrap();

        let err = client.list_mounts().await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }
}
