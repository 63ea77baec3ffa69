use crate::VaultError;
use crate::client::VaultClient;
use crate::models::Secret;
use async_trait::async_trait;
use reqwest::Method;
use std::collections::HashMap;

/// Write half of the logical API. Login only needs this.
#[async_trait]
pub trait LogicalWriter: Send + Sync {
    async fn write(
        &self,
        path: &str,
        data: HashMap<String, serde_json::Value>,
    ) -> Result<Option<Secret>, VaultError>;
}

/// Logical read, write and list. Absent paths read and list as `None`.
#[async_trait]
pub trait Logical: LogicalWriter {
    async fn read(&self, path: &str) -> Result<Option<Secret>, VaultError>;

    async fn list(&self, path: &str) -> Result<Option<Secret>, VaultError>;
}

fn not_found_as_none(result: Result<Option<Secret>, VaultError>) -> Result<Option<Secret>, VaultError> {
    match result {
        Err(VaultError::ClientError { status: 404, .. }) => Ok(None),
        other => other,
    }
}

#[async_trait]
impl LogicalWriter for VaultClient {
    async fn write(
        &self,
        path: &str,
        data: HashMap<String, serde_json::Value>,
    ) -> Result<Option<Secret>, VaultError> {
        let body = serde_json::to_value(data)?;
        self.send(Method::PUT, path, &[], Some(&body)).await
    }
}

#[async_trait]
impl Logical for VaultClient {
    async fn read(&self, path: &str) -> Result<Option<Secret>, VaultError> {
        not_found_as_none(self.send(Method::GET, path, &[], None).await)
    }

    async fn list(&self, path: &str) -> Result<Option<Secret>, VaultError> {
        not_found_as_none(self.send(Method::GET, path, &[("list", "true")], None).await)
    }
}
