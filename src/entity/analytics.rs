// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entity::traits::{new_record, required_date, required_string, SyncableEntity};
use crate::record::{DecodeError, FieldKind, FieldSpec, RecordId, RemoteRecord, Schema};

static SCHEMA: Schema = Schema {
    record_type: "AnalyticsEvent",
    fields: &[
        FieldSpec::required("name", FieldKind::String),
        FieldSpec::optional("userId", FieldKind::String),
        FieldSpec::optional("properties", FieldKind::List),
        FieldSpec::required("occurredAt", FieldKind::Date),
    ],
};

/// A telemetry event such as a share or a session start.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub id: String,
    pub name: String,
    pub user_id: Option<String>,
    /// `(key, value)` pairs, stored as `key=value` strings
    pub properties: Vec<(String, String)>,
    pub occurred_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            user_id,
            properties: Vec::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }
}

impl SyncableEntity for AnalyticsEvent {
    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn record_id(&self) -> RecordId {
        RecordId::new(self.id.clone())
    }

    fn encode(&self) -> RemoteRecord {
        let properties: Vec<String> = self
            .properties
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();

        let mut record = new_record(self)
            .with("name", self.name.as_str())
            .with("properties", properties)
            .with("occurredAt", self.occurred_at);
        record.set_opt("userId", self.user_id.clone());
        record
    }

    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError> {
        // Entries without '=' carry no value; keep the key with an empty value.
        let properties = record
            .string_list("properties")
            .into_iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (entry, String::new()),
            })
            .collect();

        Ok(Self {
            id: record.id.to_string(),
            name: required_string(record, "name")?,
            user_id: record.string("userId").map(str::to_string),
            properties,
            occurred_at: required_date(record, "occurredAt")?,
        })
    }
}
