// SPDX-License-Identifier: GPL-3.0-only
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::entity::SyncableEntity;

/// Last-known entity values keyed by [`SyncableEntity::cache_key`].
///
/// The cache is the read-through source for views; writers update it before
/// or after the remote call depending on whether the write is optimistic.
pub struct EntityCache<E: SyncableEntity> {
    entries: RwLock<HashMap<String, E>>,
}

impl<E: SyncableEntity> EntityCache<E> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<E> {
        self.entries.read().await.get(key).cloned()
    }

    /// Stores `entity` and returns the value it replaced.
    pub async fn put(&self, entity: E) -> Option<E> {
        let key = entity.cache_key();
        self.entries.write().await.insert(key, entity)
    }

    /// Puts back a snapshot taken before an optimistic write.
    pub async fn restore(&self, key: &str, snapshot: Option<E>) {
        let mut entries = self.entries.write().await;
        match snapshot {
            Some(entity) => {
                entries.insert(key.to_string(), entity);
            }
            None => {
                entries.remove(key);
            }
        }
    }

    pub async fn remove(&self, key: &str) -> Option<E> {
        self.entries.write().await.remove(key)
    }

    pub async fn values(&self) -> Vec<E> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl<E: SyncableEntity> Default for EntityCache<E> {
    fn default() -> Self {
        Self::new()
    }
}
