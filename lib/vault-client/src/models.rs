use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Generic Vault response envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub data: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub auth: Option<SecretAuth>,
}

impl Secret {
    /// Auth lease of the secret, if it is renewable and still has time left
    pub fn renewable_auth(&self) -> Option<&SecretAuth> {
        self.auth
            .as_ref()
            .filter(|auth| auth.renewable && auth.lease_duration > 0)
    }
}

/// Auth block returned by login and token endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretAuth {
    pub client_token: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub policies: Vec<String>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

/// One entry of the `sys/mounts` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountOutput {
    #[serde(rename = "type")]
    pub mount_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Option<HashMap<String, String>>,
}

impl MountOutput {
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .as_ref()
            .and_then(|options| options.get(key))
            .map(String::as_str)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
