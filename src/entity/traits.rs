// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use crate::record::{DecodeError, RecordId, RemoteRecord, Schema};

/// A domain value that projects losslessly to and from a [`RemoteRecord`].
///
/// `decode(&encode(e)) == e` must hold for every value, with absent optional
/// fields resolving to their defaults.
pub trait SyncableEntity: Clone + Send + Sync + 'static {
    fn schema() -> &'static Schema;

    fn record_id(&self) -> RecordId;

    fn encode(&self) -> RemoteRecord;

    /// Map fields of a record that already passed schema validation.
    fn decode_fields(record: &RemoteRecord) -> Result<Self, DecodeError>;

    fn decode(record: &RemoteRecord) -> Result<Self, DecodeError> {
        Self::schema().validate(record)?;
        Self::decode_fields(record)
    }

    fn record_type() -> &'static str {
        Self::schema().record_type
    }

    /// Key under which the entity is cached.
    fn cache_key(&self) -> String {
        self.record_id().to_string()
    }
}

pub(crate) fn required_string(
    record: &RemoteRecord,
    field: &'static str,
) -> Result<String, DecodeError> {
    record
        .string(field)
        .map(str::to_string)
        .ok_or_else(|| DecodeError::MissingField {
            record_id: record.id.to_string(),
            field,
        })
}

pub(crate) fn required_date(
    record: &RemoteRecord,
    field: &'static str,
) -> Result<DateTime<Utc>, DecodeError> {
    record.date(field).ok_or_else(|| DecodeError::MissingField {
        record_id: record.id.to_string(),
        field,
    })
}

pub(crate) fn new_record<E: SyncableEntity>(entity: &E) -> RemoteRecord {
    RemoteRecord::new(E::record_type(), entity.record_id())
}
