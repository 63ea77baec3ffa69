use crate::error::KvError;
use crate::path::{LIST_PREFIX, READ_PREFIX, WRITE_PREFIX, fix_path};
use serde_json::Value;
use std::collections::HashMap;
use vault_client::{Logical, MountOutput, Sys, VaultClient};

/// Wire revision of a KV secret engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvVersion {
    /// Flat keyspace, also the legacy `generic` engine
    V1 = 1,
    /// Versioned, with `data/` and `metadata/` API sub-paths
    V2 = 2,
}

/// KV client. Reads, writes and lists the same way on KV version 1 and 2.
///
/// The engine version and mount are resolved once in [`Client::new`] and
/// every path passed afterwards must lie under that mount.
#[derive(Debug, Clone)]
pub struct Client<C = VaultClient> {
    client: C,
    version: KvVersion,
    mount: String,
}

impl<C> Client<C>
where
    C: Logical + Sys,
{
    /// Creates a KV client for the engine mounted under `p`.
    ///
    /// p = secret/ -> K/V engine mount path secret/
    /// p = secret  -> error
    pub async fn new(client: C, p: &str) -> Result<Self, KvError> {
        if p.starts_with('/') {
            return Err(KvError::LeadingSlash {
                path: p.to_string(),
            });
        }
        if !p.contains('/') {
            return Err(KvError::MissingSeparator {
                path: p.to_string(),
            });
        }

        let mounts = client
            .list_mounts()
            .await
            .map_err(KvError::vault("sys/mounts"))?;
        let (mount, version) = resolve_mount(&mounts, p)?;
        tracing::debug!(mount = %mount, version = version as u8, "Resolved KV engine");

        Ok(Self {
            client,
            version,
            mount,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Engine version, 1 or 2
    pub fn version(&self) -> u8 {
        self.version as u8
    }

    pub fn kv_version(&self) -> KvVersion {
        self.version
    }

    /// Resolved mount prefix, e.g. `secret/`
    pub fn mount(&self) -> &str {
        &self.mount
    }

    fn api_path(&self, p: &str, prefix: &str) -> String {
        match self.version {
            KvVersion::V1 => p.to_string(),
            KvVersion::V2 => fix_path(p, &self.mount, prefix),
        }
    }

    /// Reads a secret. `None` if nothing is stored at `p`.
    pub async fn read(&self, p: &str) -> Result<Option<HashMap<String, Value>>, KvError> {
        let p = self.api_path(p, READ_PREFIX);
        let secret = self.client.read(&p).await.map_err(KvError::vault(&p))?;
        let Some(mut data) = secret.and_then(|s| s.data) else {
            return Ok(None);
        };

        match self.version {
            KvVersion::V1 => Ok(Some(data)),
            KvVersion::V2 => match data.remove("data") {
                Some(Value::Object(inner)) => Ok(Some(inner.into_iter().collect())),
                // deleted or destroyed version
                None | Some(Value::Null) => Ok(None),
                Some(_) => Err(KvError::MalformedResponse {
                    path: p,
                    reason: "data is not an object".to_string(),
                }),
            },
        }
    }

    /// Writes a secret, replacing what is stored at `p`
    pub async fn write(&self, p: &str, data: HashMap<String, Value>) -> Result<(), KvError> {
        let p = self.api_path(p, WRITE_PREFIX);
        let data = match self.version {
            KvVersion::V1 => data,
            KvVersion::V2 => HashMap::from([(
                "data".to_string(),
                Value::Object(data.into_iter().collect()),
            )]),
        };
        self.client
            .write(&p, data)
            .await
            .map_err(KvError::vault(&p))?;
        Ok(())
    }

    /// Lists the keys under `p`. Sub-paths end with `/`. `None` if `p` holds no keys.
    pub async fn list(&self, p: &str) -> Result<Option<Vec<String>>, KvError> {
        let p = self.api_path(p, LIST_PREFIX);
        let secret = self.client.list(&p).await.map_err(KvError::vault(&p))?;
        let Some(data) = secret.and_then(|s| s.data) else {
            return Ok(None);
        };

        let malformed = |reason: &str| KvError::MalformedResponse {
            path: p.clone(),
            reason: reason.to_string(),
        };
        let keys = match data.get("keys") {
            Some(Value::Array(keys)) => keys,
            None | Some(Value::Null) => return Ok(None),
            Some(_) => return Err(malformed("keys is not an array")),
        };

        keys.iter()
            .map(|key| {
                key.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| malformed("key is not a string"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Finds the mount serving `p`. With nested mounts the longest prefix wins.
fn resolve_mount(
    mounts: &HashMap<String, MountOutput>,
    p: &str,
) -> Result<(String, KvVersion), KvError> {
    let (mount, info) = mounts
        .iter()
        .filter(|(mount, _)| p.starts_with(mount.as_str()))
        .max_by_key(|(mount, _)| mount.len())
        .ok_or_else(|| KvError::NoMount {
            path: p.to_string(),
        })?;

    let version = match info.mount_type.as_str() {
        "generic" => KvVersion::V1,
        "kv" => match info.option("version") {
            Some("1") => KvVersion::V1,
            Some("2") => KvVersion::V2,
            version => {
                return Err(KvError::InvalidVersion {
                    mount: mount.clone(),
                    path: p.to_string(),
                    version: version.map(str::to_string),
                });
            }
        },
        _ => {
            return Err(KvError::NotKv {
                mount: mount.clone(),
                path: p.to_string(),
            });
        }
    };

    Ok((mount.clone(), version))
}
