// SPDX-License-Identifier: GPL-3.0-only
use crate::entity::traits::{new_record, required_string, SyncableEntity};
use crate::record::{DecodeError, FieldKind, FieldSpec, RecordId, RecordMeta, RemoteRecord, Schema};

static SCHEMA: Schema = Schema {
    record_type: "ProfilePhoto",
    fields: &[
        FieldSpec::required("userId", FieldKind::String),
        FieldSpec::required("image", FieldKind::Bytes),
        FieldSpec::optional("contentType", FieldKind::String),
    ],
};

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePhoto {
    pub user_id: String,
    pub image: Vec<u8>,
    pub content_type: String,
    pub meta: RecordMeta,
}

impl ProfilePhoto {
    pub fn new(user_id: impl Into<String>, image: Vec<u8>) -> Self {
        Self {
            user_id: user_id.into(),
            image,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            meta: RecordMeta::default(),
        }
    }

    pub fn id_for(user_id: &str) -> RecordId {
        RecordId::new(format!("photo_{}", user_id))
    }
}

impl SyncableEntity for ProfilePhoto {
    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn record_id(&self) -> RecordId {
        Self::id_for(&self.user_id)
    }

    fn encode(&self) -> RemoteRecord {
        new_record(self)
            .with_meta(&self.meta)
            .with("userId", self.user_id.as_str())
            .with("image", self.image.clone())
            .with("contentType", self.content_type.as_str())
    }

    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError> {
        let image = record
            .bytes("image")
            .map(<[u8]>::to_vec)
            .ok_or_else(|| DecodeError::MissingField {
                record_id: record.id.to_string(),
                field: "image",
            })?;

        Ok(Self {
            user_id: required_string(record, "userId")?,
            image,
            content_type: record.string_or("contentType", DEFAULT_CONTENT_TYPE),
            meta: RecordMeta::from_record(record),
        })
    }
}
