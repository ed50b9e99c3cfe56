// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::EntityCache;
use crate::entity::SyncableEntity;
use crate::error::SyncError;
use crate::record::{RecordId, RemoteRecord};
use crate::store::{Cursor, Predicate, Query, RemoteStore, SortDescriptor};
use crate::sync::retry::{with_retry, RetryPolicies, RetryPolicy};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Typed, retrying front of a [`RemoteStore`].
pub struct SyncClient {
    store: Arc<dyn RemoteStore>,
    policies: RetryPolicies,
    page_size: usize,
}

impl SyncClient {
    pub fn new(store: Arc<dyn RemoteStore>, policies: RetryPolicies) -> Self {
        Self {
            store,
            policies,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn policies(&self) -> &RetryPolicies {
        &self.policies
    }

    pub async fn save<E: SyncableEntity>(&self, entity: &E) -> Result<E, SyncError> {
        self.save_with(entity, &self.policies.save).await
    }

    /// Save with an explicit policy; returns the entity as confirmed by the store.
    pub async fn save_with<E: SyncableEntity>(
        &self,
        entity: &E,
        policy: &RetryPolicy,
    ) -> Result<E, SyncError> {
        let saved = self.save_record(entity.encode(), policy).await?;
        E::decode(&saved).map_err(|e| {
            SyncError::Unknown(format!("Store returned an unreadable record: {}", e))
        })
    }

    pub async fn save_record(
        &self,
        record: RemoteRecord,
        policy: &RetryPolicy,
    ) -> Result<RemoteRecord, SyncError> {
        let record_id = record.id.clone();
        let saved = with_retry(policy, "save", || self.store.save(record.clone())).await?;
        debug!(record_id = %record_id, "Record saved");
        Ok(saved)
    }

    pub async fn fetch<E: SyncableEntity>(&self, id: &RecordId) -> Result<E, SyncError> {
        let record = with_retry(&self.policies.fetch, "fetch", || self.store.fetch(id)).await?;
        E::decode(&record).map_err(|e| {
            warn!(record_id = %id, error = %e, "Failed to decode fetched record");
            SyncError::Unknown(e.to_string())
        })
    }

    /// Like [`SyncClient::fetch`] but a missing record is `None`.
    pub async fn fetch_optional<E: SyncableEntity>(
        &self,
        id: &RecordId,
    ) -> Result<Option<E>, SyncError> {
        match self.fetch(id).await {
            Ok(entity) => Ok(Some(entity)),
            Err(SyncError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self, id: &RecordId) -> Result<(), SyncError> {
        with_retry(&self.policies.save, "delete", || self.store.delete(id)).await?;
        debug!(record_id = %id, "Record deleted");
        Ok(())
    }

    /// A single page of matching entities.
    pub async fn query<E: SyncableEntity>(
        &self,
        predicate: Predicate,
        sort: Option<SortDescriptor>,
        limit: usize,
    ) -> Result<Vec<E>, SyncError> {
        let query = self.build_query::<E>(predicate, sort, limit);
        let records = self.query_page(&query, None).await?.0;
        Ok(decode_all(records))
    }

    /// Every matching entity, following cursors until the result set is exhausted.
    pub async fn query_all<E: SyncableEntity>(
        &self,
        predicate: Predicate,
        sort: Option<SortDescriptor>,
    ) -> Result<Vec<E>, SyncError> {
        let query = self.build_query::<E>(predicate, sort, self.page_size);
        let records = self.collect_all(&query).await?;
        Ok(decode_all(records))
    }

    /// Number of matching records, counted across all pages.
    pub async fn count<E: SyncableEntity>(&self, predicate: Predicate) -> Result<u64, SyncError> {
        let query = self.build_query::<E>(predicate, None, self.page_size);
        let records = self.collect_all(&query).await?;
        Ok(records.len() as u64)
    }

    fn build_query<E: SyncableEntity>(
        &self,
        predicate: Predicate,
        sort: Option<SortDescriptor>,
        limit: usize,
    ) -> Query {
        let limit = if limit == 0 { self.page_size } else { limit };
        let query = Query::new(E::record_type()).filter(predicate).limit(limit);
        match sort {
            Some(sort) => query.sort(sort),
            None => query,
        }
    }

    async fn query_page(
        &self,
        query: &Query,
        cursor: Option<&Cursor>,
    ) -> Result<(Vec<RemoteRecord>, Option<Cursor>), SyncError> {
        let page = with_retry(&self.policies.fetch, "query", || self.store.query(query, cursor)).await?;
        Ok((page.records, page.cursor))
    }

    async fn collect_all(&self, query: &Query) -> Result<Vec<RemoteRecord>, SyncError> {
        let mut records = Vec::new();
        let mut cursor = None;
        let mut pages = 0usize;

        loop {
            let (page, next) = self.query_page(query, cursor.as_ref()).await?;
            pages += 1;
            records.extend(page);
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            record_type = %query.record_type,
            count = records.len(),
            pages,
            "Query completed"
        );
        Ok(records)
    }
}

/// Decode records, dropping the ones that do not fit the entity's schema.
fn decode_all<E: SyncableEntity>(records: Vec<RemoteRecord>) -> Vec<E> {
    records
        .into_iter()
        .filter_map(|record| match E::decode(&record) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Skipping undecodable record");
                None
            }
        })
        .collect()
}

/// A [`SyncClient`] paired with the cache for one entity type.
pub struct Repository<E: SyncableEntity> {
    client: Arc<SyncClient>,
    cache: EntityCache<E>,
}

impl<E: SyncableEntity> Repository<E> {
    pub fn new(client: Arc<SyncClient>) -> Self {
        Self {
            client,
            cache: EntityCache::new(),
        }
    }

    pub fn client(&self) -> &SyncClient {
        &self.client
    }

    pub fn cache(&self) -> &EntityCache<E> {
        &self.cache
    }

    /// Cached value if present, otherwise fetched and cached.
    pub async fn get(&self, id: &RecordId) -> Result<E, SyncError> {
        if let Some(entity) = self.cache.get(id.as_str()).await {
            return Ok(entity);
        }
        self.refresh(id).await
    }

    pub async fn get_optional(&self, id: &RecordId) -> Result<Option<E>, SyncError> {
        match self.get(id).await {
            Ok(entity) => Ok(Some(entity)),
            Err(SyncError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn refresh(&self, id: &RecordId) -> Result<E, SyncError> {
        let entity = self.client.fetch::<E>(id).await?;
        self.cache.put(entity.clone()).await;
        Ok(entity)
    }

    /// Saves remotely, then caches the confirmed value.
    pub async fn save(&self, entity: &E) -> Result<E, SyncError> {
        self.save_with(entity, &self.client.policies().save).await
    }

    pub async fn save_with(&self, entity: &E, policy: &RetryPolicy) -> Result<E, SyncError> {
        let saved = self.client.save_with(entity, policy).await?;
        self.cache.put(saved.clone()).await;
        Ok(saved)
    }

    pub async fn delete(&self, id: &RecordId) -> Result<(), SyncError> {
        self.client.delete(id).await?;
        self.cache.remove(id.as_str()).await;
        Ok(())
    }

    pub async fn query_all(
        &self,
        predicate: Predicate,
        sort: Option<SortDescriptor>,
    ) -> Result<Vec<E>, SyncError> {
        let entities = self.client.query_all::<E>(predicate, sort).await?;
        for entity in &entities {
            self.cache.put(entity.clone()).await;
        }
        Ok(entities)
    }

    pub async fn query(
        &self,
        predicate: Predicate,
        sort: Option<SortDescriptor>,
        limit: usize,
    ) -> Result<Vec<E>, SyncError> {
        let entities = self.client.query::<E>(predicate, sort, limit).await?;
        for entity in &entities {
            self.cache.put(entity.clone()).await;
        }
        Ok(entities)
    }
}
