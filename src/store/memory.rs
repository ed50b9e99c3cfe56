// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError, Sender};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SyncError;
use crate::record::{RecordId, RemoteRecord};
use crate::store::predicate::Predicate;
use crate::store::traits::{Cursor, Query, QueryPage, RecordChange, RemoteStore, SubscriptionHandle};

const DEFAULT_MAX_PAGE_SIZE: usize = 100;
const SUBSCRIPTION_BUFFER: usize = 64;

struct Subscription {
    id: String,
    record_type: String,
    predicate: Predicate,
    sender: Sender<RecordChange>,
}

#[derive(Default)]
struct MemoryState {
    /// Insertion order is the store's natural result order
    records: Vec<RemoteRecord>,
    next_tag: u64,
    subscriptions: Vec<Subscription>,
}

impl MemoryState {
    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }

    fn notify(&mut self, record_type: &str, record: Option<&RemoteRecord>, change: RecordChange) {
        self.subscriptions.retain(|subscription| {
            if subscription.record_type != record_type {
                return true;
            }
            if let Some(record) = record {
                if !subscription.predicate.matches(record) {
                    return true;
                }
            }
            match subscription.sender.try_send(change.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(subscription_id = %subscription.id, "Subscription buffer full, dropping change");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscription_id = %subscription.id, "Subscriber gone, removing subscription");
                    false
                }
            }
        });
    }
}

/// In-process record store with server-like metadata, paging and change
/// notifications. Used for local development and tests.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    max_page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_MAX_PAGE_SIZE)
    }

    pub fn with_page_size(max_page_size: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_page_size: max_page_size.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn parse_cursor(cursor: Option<&Cursor>) -> Result<usize, SyncError> {
        match cursor {
            None => Ok(0),
            Some(Cursor(raw)) => raw
                .strip_prefix("offset:")
                .and_then(|offset| offset.parse().ok())
                .ok_or_else(|| SyncError::Unknown(format!("Malformed cursor: {}", raw))),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn save(&self, mut record: RemoteRecord) -> Result<RemoteRecord, SyncError> {
        let mut state = self.state.write().await;
        let existing = state.position(&record.id);

        if let (Some(index), Some(incoming_tag)) = (existing, record.change_tag.as_ref()) {
            let stored_tag = state.records[index].change_tag.as_ref();
            if stored_tag.is_some_and(|stored| stored != incoming_tag) {
                return Err(SyncError::record_changed(record.id.to_string()));
            }
        }

        state.next_tag += 1;
        record.change_tag = Some(state.next_tag.to_string());
        record.modified_at = Some(Utc::now());

        match existing {
            Some(index) => state.records[index] = record.clone(),
            None => state.records.push(record.clone()),
        }

        let record_type = record.record_type.clone();
        state.notify(
            &record_type,
            Some(&record),
            RecordChange::Saved {
                record: record.clone(),
            },
        );

        debug!(record_id = %record.id, record_type = %record.record_type, "Saved record");
        Ok(record)
    }

    async fn fetch(&self, id: &RecordId) -> Result<RemoteRecord, SyncError> {
        let state = self.state.read().await;
        state
            .position(id)
            .map(|index| state.records[index].clone())
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &RecordId) -> Result<(), SyncError> {
        let mut state = self.state.write().await;
        if let Some(index) = state.position(id) {
            let removed = state.records.remove(index);
            state.notify(
                &removed.record_type,
                Some(&removed),
                RecordChange::Deleted {
                    id: removed.id.clone(),
                    record_type: removed.record_type.clone(),
                },
            );
            debug!(record_id = %id, "Deleted record");
        }
        Ok(())
    }

    async fn query(&self, query: &Query, cursor: Option<&Cursor>) -> Result<QueryPage, SyncError> {
        let offset = Self::parse_cursor(cursor)?;
        let page_size = match query.limit {
            0 => self.max_page_size,
            limit => limit.min(self.max_page_size),
        };

        let mut matching: Vec<RemoteRecord> = {
            let state = self.state.read().await;
            state
                .records
                .iter()
                .filter(|record| record.record_type == query.record_type)
                .filter(|record| query.predicate.matches(record))
                .cloned()
                .collect()
        };

        if let Some(sort) = &query.sort {
            sort.apply(&mut matching);
        }

        let total = matching.len();
        let end = offset.saturating_add(page_size).min(total);
        let records = if offset < total {
            matching.drain(offset..end).collect()
        } else {
            Vec::new()
        };
        let cursor = (end < total).then(|| Cursor(format!("offset:{}", end)));

        Ok(QueryPage { records, cursor })
    }

    async fn subscribe(
        &self,
        record_type: &str,
        predicate: Predicate,
    ) -> Result<SubscriptionHandle, SyncError> {
        let (sender, changes) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let id = Uuid::new_v4().to_string();

        self.state.write().await.subscriptions.push(Subscription {
            id: id.clone(),
            record_type: record_type.to_string(),
            predicate,
            sender,
        });

        info!(subscription_id = %id, record_type, "Registered subscription");
        Ok(SubscriptionHandle {
            id,
            record_type: record_type.to_string(),
            changes,
        })
    }

    async fn unsubscribe(&self, subscription_id: &str) -> Result<(), SyncError> {
        self.state
            .write()
            .await
            .subscriptions
            .retain(|subscription| subscription.id != subscription_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::predicate::SortDescriptor;

    fn recipe(id: &str, public: bool) -> RemoteRecord {
        RemoteRecord::new("Recipe", id)
            .with("title", format!("Recipe {}", id))
            .with("isPublic", public)
    }

    #[tokio::test]
    async fn test_save_assigns_metadata() {
        let store = MemoryStore::new();
        let saved = store.save(recipe("r1", true)).await.unwrap();
        assert!(saved.modified_at.is_some());
        assert!(saved.change_tag.is_some());
        assert_eq!(store.fetch(&"r1".into()).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.fetch(&"nope".into()).await.unwrap_err();
        assert_eq!(err, SyncError::NotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn test_stale_change_tag_conflicts() {
        let store = MemoryStore::new();
        let first = store.save(recipe("r1", true)).await.unwrap();
        let second = store.save(first.clone().with("title", "Edited")).await.unwrap();
        assert_ne!(first.change_tag, second.change_tag);

        let err = store.save(first.with("title", "Stale")).await.unwrap_err();
        assert_eq!(err, SyncError::record_changed("r1"));
    }

    #[tokio::test]
    async fn test_save_without_tag_overwrites() {
        let store = MemoryStore::new();
        store.save(recipe("r1", true)).await.unwrap();
        store.save(recipe("r1", false)).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert!(!store.fetch(&"r1".into()).await.unwrap().bool_or("isPublic", true));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.save(recipe("r1", true)).await.unwrap();
        store.delete(&"r1".into()).await.unwrap();
        store.delete(&"r1".into()).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_pages_with_cursor() {
        let store = MemoryStore::with_page_size(2);
        for i in 0..5 {
            store.save(recipe(&format!("r{}", i), true)).await.unwrap();
        }

        let query = Query::new("Recipe");
        let first = store.query(&query, None).await.unwrap();
        assert_eq!(first.records.len(), 2);
        let cursor = first.cursor.unwrap();

        let second = store.query(&query, Some(&cursor)).await.unwrap();
        assert_eq!(second.records[0].id.as_str(), "r2");

        let third = store.query(&query, second.cursor.as_ref()).await.unwrap();
        assert_eq!(third.records.len(), 1);
        assert!(third.cursor.is_none());
    }

    #[tokio::test]
    async fn test_query_filters_type_and_predicate() {
        let store = MemoryStore::new();
        store.save(recipe("r1", true)).await.unwrap();
        store.save(recipe("r2", false)).await.unwrap();
        store
            .save(RemoteRecord::new("UserProfile", "u1").with("isPublic", true))
            .await
            .unwrap();

        let query = Query::new("Recipe").filter(Predicate::eq("isPublic", true));
        let page = store.query(&query, None).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id.as_str(), "r1");
    }

    #[tokio::test]
    async fn test_query_sorts() {
        let store = MemoryStore::new();
        for (id, likes) in [("a", 3i64), ("b", 9), ("c", 1)] {
            store.save(recipe(id, true).with("likeCount", likes)).await.unwrap();
        }
        let query = Query::new("Recipe").sort(SortDescriptor::descending("likeCount"));
        let page = store.query(&query, None).await.unwrap();
        let ids: Vec<&str> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_malformed_cursor() {
        let store = MemoryStore::new();
        let result = store
            .query(&Query::new("Recipe"), Some(&Cursor("bogus".to_string())))
            .await;
        assert!(matches!(result, Err(SyncError::Unknown(_))));
    }

    #[tokio::test]
    async fn test_cursor_past_end_is_empty() {
        let store = MemoryStore::new();
        store.save(recipe("r1", true)).await.unwrap();

        let cursor = Cursor(format!("offset:{}", usize::MAX));
        let page = store.query(&Query::new("Recipe"), Some(&cursor)).await.unwrap();
        assert!(page.records.is_empty());
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn test_subscription_receives_matching_changes() {
        let store = MemoryStore::new();
        let mut handle = store
            .subscribe("Recipe", Predicate::eq("isPublic", true))
            .await
            .unwrap();

        store.save(recipe("hidden", false)).await.unwrap();
        store.save(recipe("shown", true)).await.unwrap();
        store.delete(&"shown".into()).await.unwrap();

        match handle.changes.recv().await.unwrap() {
            RecordChange::Saved { record } => assert_eq!(record.id.as_str(), "shown"),
            other => panic!("unexpected change: {:?}", other),
        }
        match handle.changes.recv().await.unwrap() {
            RecordChange::Deleted { id, record_type } => {
                assert_eq!(id.as_str(), "shown");
                assert_eq!(record_type, "Recipe");
            }
            other => panic!("unexpected change: {:?}", other),
        }
        assert!(handle.changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_channel() {
        let store = MemoryStore::new();
        let mut handle = store.subscribe("Recipe", Predicate::all()).await.unwrap();
        store.unsubscribe(&handle.id).await.unwrap();
        store.save(recipe("r1", true)).await.unwrap();
        assert!(handle.changes.recv().await.is_none());
    }
}
