// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;

use crate::error::SyncError;
use crate::record::{RecordId, RemoteRecord};
use crate::store::predicate::{Predicate, SortDescriptor};

/// Opaque continuation token returned with a partial query page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub record_type: String,

    #[serde(default)]
    pub predicate: Predicate,

    #[serde(default)]
    pub sort: Option<SortDescriptor>,

    /// Page size; 0 lets the store pick its maximum
    #[serde(default)]
    pub limit: usize,
}

impl Query {
    pub fn new(record_type: &str) -> Self {
        Self {
            record_type: record_type.to_string(),
            predicate: Predicate::all(),
            sort: None,
            limit: 0,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn sort(mut self, sort: SortDescriptor) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    pub records: Vec<RemoteRecord>,

    /// Present while more results remain
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

/// Change notification delivered to a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordChange {
    Saved { record: RemoteRecord },
    Deleted { id: RecordId, record_type: String },
}

#[derive(Debug)]
pub struct SubscriptionHandle {
    pub id: String,
    pub record_type: String,
    pub changes: Receiver<RecordChange>,
}

/// The remote record store the client syncs against.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create or replace a record; returns it with server metadata set
    async fn save(&self, record: RemoteRecord) -> Result<RemoteRecord, SyncError>;

    async fn fetch(&self, id: &RecordId) -> Result<RemoteRecord, SyncError>;

    /// Deleting a missing record succeeds
    async fn delete(&self, id: &RecordId) -> Result<(), SyncError>;

    async fn query(&self, query: &Query, cursor: Option<&Cursor>) -> Result<QueryPage, SyncError>;

    /// Register for changes to records of `record_type` matching `predicate`
    async fn subscribe(
        &self,
        record_type: &str,
        predicate: Predicate,
    ) -> Result<SubscriptionHandle, SyncError>;

    async fn unsubscribe(&self, subscription_id: &str) -> Result<(), SyncError>;
}
