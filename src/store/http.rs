// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{ConflictReason, SyncError};
use crate::record::{RecordId, RemoteRecord};
use crate::store::predicate::Predicate;
use crate::store::traits::{Cursor, Query, QueryPage, RecordChange, RemoteStore, SubscriptionHandle};
use crate::utils::validate_backend_url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SUBSCRIPTION_BUFFER: usize = 64;

/// Map a non-success HTTP status onto the failure taxonomy.
pub fn error_for_status(status: StatusCode, body: &str, subject: &str) -> SyncError {
    let detail = if body.is_empty() {
        format!("{} ({})", subject, status)
    } else {
        format!("{} ({}): {}", subject, status, body)
    };

    match status.as_u16() {
        401 => SyncError::Unauthenticated,
        403 => SyncError::PermissionDenied(detail),
        404 => SyncError::NotFound(subject.to_string()),
        409 => match serde_json::from_str::<ConflictReason>(body) {
            Ok(reason) => SyncError::Conflict(reason),
            Err(_) => SyncError::record_changed(subject),
        },
        429 | 502 | 503 | 504 => SyncError::TransientUnavailable(detail),
        507 => SyncError::QuotaExceeded(detail),
        _ => SyncError::Unknown(detail),
    }
}

/// Connection details shared with the subscription pollers.
#[derive(Debug, Clone)]
struct Endpoint {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl Endpoint {
    fn url(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SyncError::Unknown(format!("Unusable base URL: {}", self.base_url)))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, SyncError> {
        let mut request = self.client.request(method, self.url(segments)?);

        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        Ok(request)
    }

    async fn send(&self, request: RequestBuilder, subject: &str) -> Result<Response, SyncError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(status = %status, subject, body = %text, "Remote store rejected request");
        Err(error_for_status(status, &text, subject))
    }

    async fn poll_changes(&self, subscription_id: &str) -> Result<Vec<RecordChange>, SyncError> {
        let request = self.request(Method::GET, &["subscriptions", subscription_id, "changes"])?;
        let response = self.send(request, subscription_id).await?;
        let body: ChangesResponse = response.json().await?;
        Ok(body.changes)
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a Query,
    cursor: Option<&'a Cursor>,
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    record_type: &'a str,
    predicate: &'a Predicate,
}

#[derive(Deserialize)]
struct SubscribeResponse {
    id: String,
}

#[derive(Deserialize)]
struct ChangesResponse {
    #[serde(default)]
    changes: Vec<RecordChange>,
}

/// Remote store reached over HTTP/JSON.
pub struct HttpRemoteStore {
    endpoint: Endpoint,
    poll_interval: Duration,
    pollers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl HttpRemoteStore {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        poll_interval: Duration,
    ) -> anyhow::Result<Self> {
        let base_url = validate_backend_url(base_url)?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("recipe-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint: Endpoint {
                client,
                base_url,
                api_key,
            },
            poll_interval,
            pollers: Mutex::new(HashMap::new()),
        })
    }

    fn spawn_poller(&self, subscription_id: String, sender: Sender<RecordChange>) -> JoinHandle<()> {
        let endpoint = self.endpoint.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                match endpoint.poll_changes(&subscription_id).await {
                    Ok(changes) => {
                        for change in changes {
                            if sender.send(change).await.is_err() {
                                debug!(subscription_id = %subscription_id, "Subscriber gone, stopping poller");
                                return;
                            }
                        }
                    }
                    Err(SyncError::NotFound(_)) => {
                        warn!(subscription_id = %subscription_id, "Subscription no longer exists on the server");
                        return;
                    }
                    Err(e) => {
                        warn!(subscription_id = %subscription_id, error = %e, "Failed to poll subscription changes");
                    }
                }
            }
        })
    }

    fn take_poller(&self, subscription_id: &str) -> Option<JoinHandle<()>> {
        match self.pollers.lock() {
            Ok(mut pollers) => pollers.remove(subscription_id),
            Err(poisoned) => poisoned.into_inner().remove(subscription_id),
        }
    }
}

impl Drop for HttpRemoteStore {
    fn drop(&mut self) {
        let pollers = match self.pollers.get_mut() {
            Ok(pollers) => pollers,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, handle) in pollers.drain() {
            handle.abort();
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn save(&self, record: RemoteRecord) -> Result<RemoteRecord, SyncError> {
        let subject = record.id.to_string();
        let request = self.endpoint.request(Method::POST, &["records"])?.json(&record);
        let response = self.endpoint.send(request, &subject).await?;
        let saved: RemoteRecord = response.json().await?;

        debug!(record_id = %saved.id, record_type = %saved.record_type, "Saved record");
        Ok(saved)
    }

    async fn fetch(&self, id: &RecordId) -> Result<RemoteRecord, SyncError> {
        let request = self.endpoint.request(Method::GET, &["records", id.as_str()])?;
        let response = self.endpoint.send(request, id.as_str()).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, id: &RecordId) -> Result<(), SyncError> {
        let request = self.endpoint.request(Method::DELETE, &["records", id.as_str()])?;
        match self.endpoint.send(request, id.as_str()).await {
            Ok(_) | Err(SyncError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn query(&self, query: &Query, cursor: Option<&Cursor>) -> Result<QueryPage, SyncError> {
        let body = QueryRequest { query, cursor };
        let request = self
            .endpoint
            .request(Method::POST, &["records", "query"])?
            .json(&body);
        let response = self.endpoint.send(request, &query.record_type).await?;
        let page: QueryPage = response.json().await?;

        debug!(
            record_type = %query.record_type,
            count = page.records.len(),
            more = page.cursor.is_some(),
            "Fetched query page"
        );
        Ok(page)
    }

    async fn subscribe(
        &self,
        record_type: &str,
        predicate: Predicate,
    ) -> Result<SubscriptionHandle, SyncError> {
        let body = SubscribeRequest {
            record_type,
            predicate: &predicate,
        };
        let request = self.endpoint.request(Method::POST, &["subscriptions"])?.json(&body);
        let response = self.endpoint.send(request, record_type).await?;
        let SubscribeResponse { id } = response.json().await?;

        let (sender, changes) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let handle = self.spawn_poller(id.clone(), sender);
        match self.pollers.lock() {
            Ok(mut pollers) => pollers.insert(id.clone(), handle),
            Err(poisoned) => poisoned.into_inner().insert(id.clone(), handle),
        };

        info!(subscription_id = %id, record_type, "Registered subscription");
        Ok(SubscriptionHandle {
            id,
            record_type: record_type.to_string(),
            changes,
        })
    }

    async fn unsubscribe(&self, subscription_id: &str) -> Result<(), SyncError> {
        if let Some(handle) = self.take_poller(subscription_id) {
            handle.abort();
        }

        let request = self
            .endpoint
            .request(Method::DELETE, &["subscriptions", subscription_id])?;
        match self.endpoint.send(request, subscription_id).await {
            Ok(_) | Err(SyncError::NotFound(_)) => Ok(()),
            Err(e) => {
                error!(subscription_id, error = %e, "Failed to remove subscription");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, ServerGuard};

    async fn setup_mock_server() -> (ServerGuard, HttpRemoteStore) {
        let server = mockito::Server::new_async().await;
        let store = HttpRemoteStore::new(
            &server.url(),
            Some("secret".to_string()),
            Duration::from_millis(10),
        )
        .unwrap();
        (server, store)
    }

    fn record_json(id: &str, tag: &str) -> String {
        serde_json::json!({
            "id": id,
            "record_type": "Recipe",
            "fields": { "title": { "type": "string", "value": "Soup" } },
            "modified_at": "2024-05-01T12:00:00Z",
            "change_tag": tag,
        })
        .to_string()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (401, SyncError::Unauthenticated.code()),
            (403, "PERMISSION_DENIED"),
            (404, "NOT_FOUND"),
            (409, "CONFLICT"),
            (429, "TRANSIENT_UNAVAILABLE"),
            (502, "TRANSIENT_UNAVAILABLE"),
            (503, "TRANSIENT_UNAVAILABLE"),
            (504, "TRANSIENT_UNAVAILABLE"),
            (507, "QUOTA_EXCEEDED"),
            (500, "UNKNOWN"),
            (418, "UNKNOWN"),
        ];
        for (status, code) in cases {
            let status = StatusCode::from_u16(status).unwrap();
            assert_eq!(error_for_status(status, "", "r1").code(), code, "status {}", status);
        }
    }

    #[test]
    fn test_conflict_body_is_parsed() {
        let err = error_for_status(
            StatusCode::CONFLICT,
            r#"{"reason":"name_taken","name":"chef_anna"}"#,
            "u1",
        );
        assert_eq!(err, SyncError::name_taken("chef_anna"));

        let err = error_for_status(StatusCode::CONFLICT, "stale", "r1");
        assert_eq!(err, SyncError::record_changed("r1"));
    }

    #[test]
    fn test_rejects_insecure_base_url() {
        let result = HttpRemoteStore::new("http://records.example.com", None, Duration::from_secs(5));
        assert!(result.is_err());
    }

    #[test]
    fn test_url_keeps_base_path() {
        let store =
            HttpRemoteStore::new("https://records.example.com/v1/", None, Duration::from_secs(5))
                .unwrap();
        let url = store.endpoint.url(&["records", "like_u1_r1"]).unwrap();
        assert_eq!(url.as_str(), "https://records.example.com/v1/records/like_u1_r1");
    }

    #[tokio::test]
    async fn test_save_sends_bearer_and_record() {
        let (mut server, store) = setup_mock_server().await;
        let mock = server
            .mock("POST", "/records")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "id": "r1",
                "record_type": "Recipe",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(record_json("r1", "7"))
            .create_async()
            .await;

        let saved = store
            .save(RemoteRecord::new("Recipe", "r1").with("title", "Soup"))
            .await
            .unwrap();
        assert_eq!(saved.change_tag.as_deref(), Some("7"));
        assert!(saved.modified_at.is_some());
        assert_eq!(saved.string("title"), Some("Soup"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_maps_errors() {
        let (mut server, store) = setup_mock_server().await;
        let _missing = server
            .mock("GET", "/records/missing")
            .with_status(404)
            .create_async()
            .await;
        let _busy = server
            .mock("GET", "/records/busy")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        assert_eq!(
            store.fetch(&"missing".into()).await.unwrap_err(),
            SyncError::NotFound("missing".to_string())
        );
        let err = store.fetch(&"busy".into()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let (mut server, store) = setup_mock_server().await;
        let mock = server
            .mock("DELETE", "/records/gone")
            .with_status(404)
            .create_async()
            .await;

        assert!(store.delete(&"gone".into()).await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_passes_cursor() {
        let (mut server, store) = setup_mock_server().await;
        let page = format!(r#"{{"records":[{}],"cursor":"offset:200"}}"#, record_json("r1", "1"));
        let mock = server
            .mock("POST", "/records/query")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "query": { "record_type": "Recipe" },
                "cursor": "offset:100",
            })))
            .with_status(200)
            .with_body(page)
            .create_async()
            .await;

        let cursor = Cursor("offset:100".to_string());
        let page = store.query(&Query::new("Recipe"), Some(&cursor)).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.cursor, Some(Cursor("offset:200".to_string())));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_subscription_polls_changes() {
        let (mut server, store) = setup_mock_server().await;
        let _create = server
            .mock("POST", "/subscriptions")
            .with_status(200)
            .with_body(r#"{"id":"sub-1"}"#)
            .create_async()
            .await;
        let changes = format!(
            r#"{{"changes":[{{"kind":"saved","record":{}}}]}}"#,
            record_json("r9", "3")
        );
        let _poll = server
            .mock("GET", "/subscriptions/sub-1/changes")
            .with_status(200)
            .with_body(changes)
            .create_async()
            .await;
        let remove = server
            .mock("DELETE", "/subscriptions/sub-1")
            .with_status(204)
            .create_async()
            .await;

        let mut handle = store.subscribe("Recipe", Predicate::all()).await.unwrap();
        assert_eq!(handle.id, "sub-1");

        match handle.changes.recv().await.unwrap() {
            RecordChange::Saved { record } => assert_eq!(record.id.as_str(), "r9"),
            other => panic!("unexpected change: {:?}", other),
        }

        store.unsubscribe("sub-1").await.unwrap();
        remove.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let store =
            HttpRemoteStore::new("http://127.0.0.1:1", None, Duration::from_secs(5)).unwrap();
        let err = store.fetch(&"r1".into()).await.unwrap_err();
        assert!(err.is_retryable(), "got {:?}", err);
    }
}
