// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::SyncError;
use crate::local::{BlobStore, SettingsStore};
use crate::record::{RecordId, RemoteRecord};
use crate::store::{Cursor, Predicate, Query, QueryPage, RemoteStore, SubscriptionHandle};
use crate::sync::{RetryPolicies, RetryPolicy};

/// Retry policies with millisecond delays so retrying tests stay fast.
pub fn quick_policies() -> RetryPolicies {
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter_min: 0.0,
        jitter_max: 0.5,
    };
    RetryPolicies {
        save: policy.clone(),
        fetch: policy.clone(),
        auth: policy,
    }
}

/// Create a test configuration with paths under `dir`
pub fn create_test_config(dir: &Path) -> Config {
    Config {
        backend_api_url: String::new(),
        backend_api_key: None,
        local_api_bind: ([127, 0, 0, 1], 0).into(), // port 0 to auto-assign
        settings_db_path: dir.join("settings.db"),
        blob_dir: dir.join("blobs"),
        query_page_size: 100,
        subscription_poll_secs: 1,
        background_queue_capacity: 16,
        log_level: "error".to_string(), // Reduce log noise in tests
        retry: quick_policies(),
    }
}

/// Failures to inject into one kind of store call.
#[derive(Default)]
struct Script {
    /// `None` entries let one call through to the inner store
    queued: Mutex<VecDeque<Option<SyncError>>>,
    always: Mutex<Option<SyncError>>,
    calls: AtomicU32,
}

impl Script {
    fn next(&self) -> Option<SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(outcome) = self.queued.lock().unwrap().pop_front() {
            return outcome;
        }
        self.always.lock().unwrap().clone()
    }

    fn queue(&self, outcomes: impl IntoIterator<Item = Option<SyncError>>) {
        self.queued.lock().unwrap().extend(outcomes);
    }

    fn set_always(&self, err: Option<SyncError>) {
        *self.always.lock().unwrap() = err;
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Wraps a real store, counting calls and failing them on demand.
pub struct ScriptedStore {
    inner: Arc<dyn RemoteStore>,
    saves: Script,
    fetches: Script,
    deletes: Script,
    queries: Script,
}

impl ScriptedStore {
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            saves: Script::default(),
            fetches: Script::default(),
            deletes: Script::default(),
            queries: Script::default(),
        }
    }

    pub fn fail_next_saves(&self, errors: Vec<SyncError>) {
        self.saves.queue(errors.into_iter().map(Some));
    }

    pub fn fail_all_saves(&self, err: Option<SyncError>) {
        self.saves.set_always(err);
    }

    pub fn fail_next_fetches(&self, errors: Vec<SyncError>) {
        self.fetches.queue(errors.into_iter().map(Some));
    }

    pub fn fail_all_deletes(&self, err: Option<SyncError>) {
        self.deletes.set_always(err);
    }

    /// Script upcoming queries in order; `None` passes a call through.
    pub fn script_queries(&self, outcomes: Vec<Option<SyncError>>) {
        self.queries.queue(outcomes);
    }

    pub fn fail_all_queries(&self, err: Option<SyncError>) {
        self.queries.set_always(err);
    }

    pub fn save_calls(&self) -> u32 {
        self.saves.calls()
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetches.calls()
    }

    pub fn delete_calls(&self) -> u32 {
        self.deletes.calls()
    }

    pub fn query_calls(&self) -> u32 {
        self.queries.calls()
    }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
    async fn save(&self, record: RemoteRecord) -> Result<RemoteRecord, SyncError> {
        match self.saves.next() {
            Some(err) => Err(err),
            None => self.inner.save(record).await,
        }
    }

    async fn fetch(&self, id: &RecordId) -> Result<RemoteRecord, SyncError> {
        match self.fetches.next() {
            Some(err) => Err(err),
            None => self.inner.fetch(id).await,
        }
    }

    async fn delete(&self, id: &RecordId) -> Result<(), SyncError> {
        match self.deletes.next() {
            Some(err) => Err(err),
            None => self.inner.delete(id).await,
        }
    }

    async fn query(&self, query: &Query, cursor: Option<&Cursor>) -> Result<QueryPage, SyncError> {
        match self.queries.next() {
            Some(err) => Err(err),
            None => self.inner.query(query, cursor).await,
        }
    }

    async fn subscribe(
        &self,
        record_type: &str,
        predicate: Predicate,
    ) -> Result<SubscriptionHandle, SyncError> {
        self.inner.subscribe(record_type, predicate).await
    }

    async fn unsubscribe(&self, subscription_id: &str) -> Result<(), SyncError> {
        self.inner.unsubscribe(subscription_id).await
    }
}

/// In-memory settings store.
#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get_raw(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn put_raw(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobs {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().unwrap().get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        self.blobs.lock().unwrap().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }
}
