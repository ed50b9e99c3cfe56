// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::traits::{new_record, required_date, required_string, SyncableEntity};
use crate::record::{DecodeError, FieldKind, FieldSpec, RecordId, RecordMeta, RemoteRecord, Schema};

static SCHEMA: Schema = Schema {
    record_type: "Recipe",
    fields: &[
        FieldSpec::required("ownerId", FieldKind::String),
        FieldSpec::required("title", FieldKind::String),
        FieldSpec::optional("description", FieldKind::String),
        FieldSpec::optional("ingredients", FieldKind::List),
        FieldSpec::optional("steps", FieldKind::List),
        FieldSpec::optional("isPublic", FieldKind::Bool),
        FieldSpec::optional("likeCount", FieldKind::Int),
        FieldSpec::optional("shareCount", FieldKind::Int),
        FieldSpec::required("createdAt", FieldKind::Date),
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,

    pub owner_id: String,

    pub title: String,

    pub description: Option<String>,

    pub ingredients: Vec<String>,

    pub steps: Vec<String>,

    /// Visible in the public feed
    pub is_public: bool,

    pub like_count: u64,

    pub share_count: u64,

    pub created_at: DateTime<Utc>,

    #[serde(skip)]
    pub meta: RecordMeta,
}

impl Recipe {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: title.into(),
            description: None,
            ingredients: Vec::new(),
            steps: Vec::new(),
            is_public: false,
            like_count: 0,
            share_count: 0,
            created_at: Utc::now(),
            meta: RecordMeta::default(),
        }
    }
}

impl SyncableEntity for Recipe {
    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn record_id(&self) -> RecordId {
        RecordId::new(self.id.clone())
    }

    fn encode(&self) -> RemoteRecord {
        let mut record = new_record(self).with_meta(&self.meta);
        record.set("ownerId", self.owner_id.as_str());
        record.set("title", self.title.as_str());
        record.set_opt("description", self.description.clone());
        record.set("ingredients", self.ingredients.clone());
        record.set("steps", self.steps.clone());
        record.set("isPublic", self.is_public);
        record.set("likeCount", self.like_count);
        record.set("shareCount", self.share_count);
        record.set("createdAt", self.created_at);
        record
    }

    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError> {
        Ok(Self {
            id: record.id.to_string(),
            owner_id: required_string(record, "ownerId")?,
            title: required_string(record, "title")?,
            description: record.string("description").map(str::to_string),
            ingredients: record.string_list("ingredients"),
            steps: record.string_list("steps"),
            is_public: record.bool_or("isPublic", false),
            like_count: record.count_or("likeCount", 0),
            share_count: record.count_or("shareCount", 0),
            created_at: required_date(record, "createdAt")?,
            meta: RecordMeta::from_record(record),
        })
    }
}
