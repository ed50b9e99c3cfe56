// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Small JSON documents persisted on the device (cached preferences and the like).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;

    /// Insert or replace the value stored under `key`
    async fn put_raw(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()>;

    /// Removing a missing key succeeds
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Binary blobs persisted on the device, e.g. profile photos.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    async fn write(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()>;

    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

pub async fn load_setting<T: DeserializeOwned>(
    store: &dyn SettingsStore,
    key: &str,
) -> anyhow::Result<Option<T>> {
    match store.get_raw(key).await? {
        Some(value) => {
            let parsed = serde_json::from_value(value)
                .with_context(|| format!("Malformed setting '{}'", key))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

pub async fn store_setting<T: Serialize + Sync>(
    store: &dyn SettingsStore,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let value = serde_json::to_value(value)
        .with_context(|| format!("Failed to serialize setting '{}'", key))?;
    store.put_raw(key, value).await
}
